//! Nested tag documents.
//!
//! A package document is a head tag whose post is a flat run of start tags
//! and literal end markers:
//!
//! ```text
//! <p …><c><d n="…"><c><f n="…" s="…"></f></c></d><f n="…" s="…"></f></c></p>
//! ```
//!
//! [`parse_tree`] rebuilds the [`FileTree`] with an explicit stack of
//! [`Frame`]s. Only the innermost frame's end marker is ever tested, so
//! siblings sharing a marker are never ambiguous. Any structural surprise
//! aborts the whole parse.

use parley_shared::{Tag, TagHead};
use tracing::debug;

use crate::error::DocumentError;
use crate::tree::{FileTree, NodeId, NodeSource};

pub const PACKAGE_TAG: &str = "p";
pub const CHILDREN_TAG: &str = "c";
pub const DIRECTORY_TAG: &str = "d";
pub const FILE_TAG: &str = "f";

/// Filesystem path of a node (local form)
pub const ATTR_NODE_PATH: &str = "p";
/// Display name of a node (remote form)
pub const ATTR_NODE_NAME: &str = "n";
pub const ATTR_NODE_SIZE: &str = "s";

/// Which attributes identify a node in the written document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentForm {
    /// Saved locally: nodes reference filesystem paths directly
    Local,
    /// Announced to peers: nodes carry only name and size
    Remote,
}

/// One open element on the parse stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// The package element itself; closing it ends the parse
    Package,
    /// A children container of a directory, or of the package (`None`)
    Children(Option<NodeId>),
    Directory(NodeId),
    File(NodeId),
}

impl Frame {
    pub fn tag_name(&self) -> &'static str {
        match self {
            Frame::Package => PACKAGE_TAG,
            Frame::Children(_) => CHILDREN_TAG,
            Frame::Directory(_) => DIRECTORY_TAG,
            Frame::File(_) => FILE_TAG,
        }
    }

    pub fn end_marker(&self) -> &'static str {
        match self {
            Frame::Package => "</p>",
            Frame::Children(_) => "</c>",
            Frame::Directory(_) => "</d>",
            Frame::File(_) => "</f>",
        }
    }

    /// Take in a completed child frame.
    pub fn receive_child(&self, child: Frame, tree: &mut FileTree) {
        match (self, child) {
            (Frame::Children(parent), Frame::Directory(id) | Frame::File(id)) => {
                tree.attach(*parent, id);
            }
            (Frame::Directory(id), Frame::Children(_)) => tree.mark_children_loaded(*id),
            _ => {}
        }
    }

    /// Build the frame for a freshly scanned start tag, creating its node in
    /// the tree. `None` when this frame cannot contain such a tag.
    pub fn placeholder_for(&self, head: &TagHead, tree: &mut FileTree) -> Option<Frame> {
        match (self, head.name.as_str()) {
            (Frame::Package, CHILDREN_TAG) => Some(Frame::Children(None)),
            (Frame::Directory(id), CHILDREN_TAG) => Some(Frame::Children(Some(*id))),
            (Frame::Children(parent), DIRECTORY_TAG) => {
                let (name, source) = node_identity(head)?;
                Some(Frame::Directory(tree.create(*parent, name, source, true, 0)))
            }
            (Frame::Children(parent), FILE_TAG) => {
                let (name, source) = node_identity(head)?;
                let size = head.decoded(ATTR_NODE_SIZE)?.trim().parse().ok()?;
                Some(Frame::File(tree.create(*parent, name, source, false, size)))
            }
            _ => None,
        }
    }
}

/// Name and source of a node from its `p` (local) or `n` (remote) attribute.
fn node_identity(head: &TagHead) -> Option<(String, NodeSource)> {
    if let Some(path) = head.decoded(ATTR_NODE_PATH) {
        let path = std::path::PathBuf::from(path);
        let name = path.file_name()?.to_string_lossy().into_owned();
        return Some((name, NodeSource::Local(path)));
    }
    let name = head.decoded(ATTR_NODE_NAME)?;
    if name.is_empty() {
        return None;
    }
    Some((name, NodeSource::Remote))
}

/// Rebuild a tree from the post of a package tag.
pub fn parse_tree(body: &[u8]) -> Result<FileTree, DocumentError> {
    let mut tree = FileTree::new();
    let mut stack = vec![Frame::Package];
    let mut cursor = 0;

    while cursor < body.len() {
        let rest = &body[cursor..];
        let Some(top) = stack.last().copied() else {
            break;
        };

        let marker = top.end_marker().as_bytes();
        if rest.starts_with(marker) {
            cursor += marker.len();
            stack.pop();
            match stack.last() {
                Some(parent) => parent.receive_child(top, &mut tree),
                None => {
                    debug!(nodes = tree.walk().len(), "Parsed package document");
                    return Ok(tree);
                }
            }
            continue;
        }

        let head = Tag::parse_basic(rest).map_err(|e| {
            DocumentError::Malformed(format!("at byte {cursor} inside <{}>: {e}", top.tag_name()))
        })?;

        let child = top.placeholder_for(&head, &mut tree).ok_or_else(|| {
            DocumentError::Malformed(format!(
                "unexpected <{}> inside <{}> at byte {cursor}",
                head.name,
                top.tag_name()
            ))
        })?;

        stack.push(child);
        cursor += head.len;
    }

    Err(DocumentError::Unbalanced { open: stack.len() })
}

/// Serialize a tree as the post of a package tag, closing the package.
pub fn write_tree(tree: &FileTree, form: DocumentForm) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<c>");
    for root in tree.roots() {
        write_node(tree, *root, form, &mut out);
    }
    out.extend_from_slice(Frame::Children(None).end_marker().as_bytes());
    out.extend_from_slice(Frame::Package.end_marker().as_bytes());
    out
}

fn write_node(tree: &FileTree, id: NodeId, form: DocumentForm, out: &mut Vec<u8>) {
    let node = &tree[id];
    let tag_name = if node.is_directory() {
        DIRECTORY_TAG
    } else {
        FILE_TAG
    };

    let mut head = Tag::new(tag_name);
    head = match (form, node.local_path()) {
        (DocumentForm::Local, Some(path)) => {
            head.with_attr(ATTR_NODE_PATH, path.to_string_lossy().into_owned())
        }
        _ => head.with_attr(ATTR_NODE_NAME, node.name()),
    };

    if node.is_directory() {
        out.extend_from_slice(head.encoded());
        if let Some(children) = node.children() {
            out.extend_from_slice(b"<c>");
            for child in children {
                write_node(tree, *child, form, out);
            }
            out.extend_from_slice(b"</c>");
        }
        out.extend_from_slice(b"</d>");
    } else {
        head = head.with_attr(ATTR_NODE_SIZE, node.size().to_string());
        out.extend_from_slice(head.encoded());
        out.extend_from_slice(b"</f>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::codec;

    fn describe(tree: &FileTree) -> Vec<(String, bool, u64, Option<usize>)> {
        tree.walk()
            .into_iter()
            .map(|id| {
                let node = &tree[id];
                (
                    tree.relative_path(id),
                    node.is_directory(),
                    node.size(),
                    node.children().map(<[NodeId]>::len),
                )
            })
            .collect()
    }

    fn sample_tree() -> FileTree {
        let mut tree = FileTree::new();
        let docs = tree.add_directory(None, "docs", NodeSource::Remote);
        tree.add_file(Some(docs), "a.txt", NodeSource::Remote, 100);
        let deep = tree.add_directory(Some(docs), "deep", NodeSource::Remote);
        let deeper = tree.add_directory(Some(deep), "deeper", NodeSource::Remote);
        tree.add_file(Some(deeper), "b.txt", NodeSource::Remote, 250);
        tree.add_directory(Some(docs), "empty", NodeSource::Remote);
        tree.add_file(None, "c.txt", NodeSource::Remote, 3);
        tree
    }

    #[test]
    fn test_roundtrip_remote_form() {
        let tree = sample_tree();
        let body = write_tree(&tree, DocumentForm::Remote);
        let parsed = parse_tree(&body).unwrap();
        assert_eq!(describe(&parsed), describe(&tree));
        assert_eq!(parsed.walk().len(), 7);
    }

    #[test]
    fn test_roundtrip_local_form_keeps_paths() {
        let mut tree = FileTree::new();
        let dir = tree.add_directory(None, "share", NodeSource::Local("/srv/share".into()));
        tree.add_file(
            Some(dir),
            "my file.txt",
            NodeSource::Local("/srv/share/my file.txt".into()),
            42,
        );

        let parsed = parse_tree(&write_tree(&tree, DocumentForm::Local)).unwrap();
        let id = parsed.find("share/my file.txt").unwrap();
        assert_eq!(
            parsed[id].local_path(),
            Some(std::path::Path::new("/srv/share/my file.txt"))
        );
        assert_eq!(parsed[id].size(), 42);
    }

    #[test]
    fn test_remote_form_hides_paths() {
        let mut tree = FileTree::new();
        tree.add_file(None, "x.txt", NodeSource::Local("/secret/x.txt".into()), 1);
        let body = write_tree(&tree, DocumentForm::Remote);
        assert!(!String::from_utf8_lossy(&body).contains(&codec::encode("/secret/x.txt")));

        let parsed = parse_tree(&body).unwrap();
        assert_eq!(parsed[parsed.roots()[0]].source(), &NodeSource::Remote);
    }

    #[test]
    fn test_empty_directory_stays_directory() {
        let mut tree = FileTree::new();
        tree.add_directory(None, "empty", NodeSource::Remote);
        let parsed = parse_tree(&write_tree(&tree, DocumentForm::Remote)).unwrap();
        let id = parsed.roots()[0];
        assert!(parsed[id].is_directory());
        assert_eq!(parsed[id].children(), Some(&[][..]));
        assert_eq!(parsed.file_count(), 0);
        assert_eq!(parsed.directory_count(), 1);
    }

    #[test]
    fn test_directory_without_children_container() {
        let head = Tag::new(DIRECTORY_TAG).with_attr(ATTR_NODE_NAME, "lazy");
        let mut body = b"<c>".to_vec();
        body.extend_from_slice(head.encoded());
        body.extend_from_slice(b"</d></c></p>");

        let parsed = parse_tree(&body).unwrap();
        let id = parsed.roots()[0];
        assert!(parsed[id].is_directory());
        assert!(parsed[id].children().is_none());
    }

    #[test]
    fn test_empty_package() {
        let parsed = parse_tree(b"<c></c></p>").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_trailing_bytes_after_package_ignored() {
        let parsed = parse_tree(b"<c></c></p>junk").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unbalanced_fails() {
        let body = write_tree(&sample_tree(), DocumentForm::Remote);
        let cut = &body[..body.len() - "</c></p>".len()];
        assert!(matches!(
            parse_tree(cut),
            Err(DocumentError::Unbalanced { open: 2 })
        ));
    }

    #[test]
    fn test_unknown_tag_aborts() {
        let head = Tag::new("x").with_attr(ATTR_NODE_NAME, "odd");
        let mut body = b"<c>".to_vec();
        body.extend_from_slice(head.encoded());
        body.extend_from_slice(b"</x></c></p>");
        assert!(matches!(parse_tree(&body), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn test_file_outside_children_container_aborts() {
        let head = Tag::new(FILE_TAG)
            .with_attr(ATTR_NODE_NAME, "a")
            .with_attr(ATTR_NODE_SIZE, "1");
        let mut body = head.encoded().to_vec();
        body.extend_from_slice(b"</f></p>");
        assert!(matches!(parse_tree(&body), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn test_file_without_size_aborts() {
        let head = Tag::new(FILE_TAG).with_attr(ATTR_NODE_NAME, "a");
        let mut body = b"<c>".to_vec();
        body.extend_from_slice(head.encoded());
        body.extend_from_slice(b"</f></c></p>");
        assert!(matches!(parse_tree(&body), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn test_garbage_between_tags_aborts() {
        assert!(matches!(
            parse_tree(b"<c> </c></p>"),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn test_mismatched_end_marker_aborts() {
        let head = Tag::new(DIRECTORY_TAG).with_attr(ATTR_NODE_NAME, "d");
        let mut body = b"<c>".to_vec();
        body.extend_from_slice(head.encoded());
        body.extend_from_slice(b"</f></c></p>");
        assert!(parse_tree(&body).is_err());
    }
}
