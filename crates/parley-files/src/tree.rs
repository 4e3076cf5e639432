//! Directory trees of shared files.
//!
//! Nodes live in an arena owned by [`FileTree`]. A node owns its children
//! through the ordered id list; the parent link is a plain [`NodeId`] and
//! never owns anything.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::ops::Index;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Where a node's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSource {
    /// On the local filesystem
    Local(PathBuf),
    /// On a remote peer; only the name and size are known
    Remote,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    name: String,
    source: NodeSource,
    is_directory: bool,
    size: u64,
    parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
}

impl FileNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &NodeSource {
        &self.source
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            NodeSource::Local(path) => Some(path),
            NodeSource::Remote => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// File size in bytes. Directories report 0.
    pub fn size(&self) -> u64 {
        if self.is_directory {
            0
        } else {
            self.size
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// `None` when the children were never loaded, `Some(&[])` for a loaded
    /// empty directory.
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().map_or(true, Vec::is_empty)
    }
}

/// An ordered forest of [`FileNode`]s.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    nodes: Vec<FileNode>,
    roots: Vec<NodeId>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from local files and directories, one root per path.
    pub fn from_local_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for path in paths {
            tree.add_local_path(path.as_ref())?;
        }
        Ok(tree)
    }

    /// Walk `root` on disk and add it (and everything below it) as a new root.
    /// The root is canonicalized first so `.` and `..` still get a real name.
    pub fn add_local_path(&mut self, root: &Path) -> Result<NodeId, TreeError> {
        let root = &root.canonicalize().map_err(|source| TreeError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let mut directories: HashMap<PathBuf, NodeId> = HashMap::new();
        let mut root_id = None;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            let parent = if entry.depth() == 0 {
                None
            } else {
                match entry.path().parent().and_then(|p| directories.get(p)) {
                    Some(id) => Some(*id),
                    None => {
                        warn!(path = %entry.path().display(), "Skipping entry without a parent node");
                        continue;
                    }
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let source = NodeSource::Local(entry.path().to_path_buf());

            let id = if entry.file_type().is_dir() {
                let id = self.add_directory(parent, name, source);
                directories.insert(entry.path().to_path_buf(), id);
                id
            } else {
                let size = entry.metadata()?.len();
                self.add_file(parent, name, source, size)
            };

            if root_id.is_none() {
                root_id = Some(id);
            }
        }

        let root_id = root_id.ok_or_else(|| TreeError::Io {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "nothing to share"),
        })?;

        debug!(
            path = %root.display(),
            nodes = self.nodes.len(),
            "Added local path to tree"
        );
        Ok(root_id)
    }

    /// Add a file under `parent` (or as a root).
    pub fn add_file(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        source: NodeSource,
        size: u64,
    ) -> NodeId {
        let id = self.create(parent, name.into(), source, false, size);
        self.attach(parent, id);
        id
    }

    /// Add a directory with its (initially empty) children loaded.
    pub fn add_directory(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        source: NodeSource,
    ) -> NodeId {
        let id = self.create(parent, name.into(), source, true, 0);
        self.mark_children_loaded(id);
        self.attach(parent, id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// All reachable nodes, depth first, parents before children.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(children) = self[id].children() {
                stack.extend(children.iter().rev().copied());
            }
        }
        order
    }

    pub fn size(&self) -> u64 {
        self.walk().into_iter().map(|id| self[id].size()).sum()
    }

    pub fn file_count(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|id| !self[*id].is_directory())
            .count()
    }

    pub fn directory_count(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|id| self[*id].is_directory())
            .count()
    }

    /// Path of a node relative to its root, names joined with `/`.
    pub fn relative_path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self[node_id];
            names.push(node.name());
            current = node.parent();
        }
        names.reverse();
        names.join("/")
    }

    /// Resolve a relative path such as `docs/notes.txt`.
    ///
    /// `..` segments never resolve.
    pub fn find(&self, relative: &str) -> Option<NodeId> {
        let mut candidates: &[NodeId] = &self.roots;
        let mut found = None;

        for segment in relative.split(['/', '\\']) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if segment == ".." {
                return None;
            }
            let id = candidates
                .iter()
                .copied()
                .find(|id| self[*id].name() == segment)?;
            candidates = self[id].children().unwrap_or(&[]);
            found = Some(id);
        }

        found
    }

    /// Open a local file node for reading.
    pub fn open(&self, id: NodeId) -> io::Result<File> {
        let node = self
            .get(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown node"))?;
        if node.is_directory() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot stream a directory",
            ));
        }
        match node.local_path() {
            Some(path) => File::open(path),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote node has no local data",
            )),
        }
    }

    // ------------------------------------------------------------------
    // Arena primitives used by the document parser
    // ------------------------------------------------------------------

    /// Create a node without linking it into its parent yet.
    pub(crate) fn create(
        &mut self,
        parent: Option<NodeId>,
        name: String,
        source: NodeSource,
        is_directory: bool,
        size: u64,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FileNode {
            name,
            source,
            is_directory,
            size,
            parent,
            children: None,
        });
        id
    }

    /// Append a created node to its parent's children (or the roots).
    pub(crate) fn attach(&mut self, parent: Option<NodeId>, child: NodeId) {
        match parent {
            Some(parent) => self.nodes[parent.0]
                .children
                .get_or_insert_with(Vec::new)
                .push(child),
            None => self.roots.push(child),
        }
    }

    pub(crate) fn mark_children_loaded(&mut self, id: NodeId) {
        self.nodes[id.0].children.get_or_insert_with(Vec::new);
    }
}

impl Index<NodeId> for FileTree {
    type Output = FileNode;

    fn index(&self, id: NodeId) -> &FileNode {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_tree() -> FileTree {
        let mut tree = FileTree::new();
        let docs = tree.add_directory(None, "docs", NodeSource::Remote);
        tree.add_file(Some(docs), "a.txt", NodeSource::Remote, 100);
        let nested = tree.add_directory(Some(docs), "nested", NodeSource::Remote);
        tree.add_file(Some(nested), "b.bin", NodeSource::Remote, 250);
        tree.add_file(None, "top.txt", NodeSource::Remote, 7);
        tree
    }

    #[test]
    fn test_aggregates() {
        let tree = sample_tree();
        assert_eq!(tree.size(), 357);
        assert_eq!(tree.file_count(), 3);
        assert_eq!(tree.directory_count(), 2);
    }

    #[test]
    fn test_walk_order() {
        let tree = sample_tree();
        let names: Vec<&str> = tree.walk().into_iter().map(|id| tree[id].name()).collect();
        assert_eq!(names, ["docs", "a.txt", "nested", "b.bin", "top.txt"]);
    }

    #[test]
    fn test_find_and_relative_path() {
        let tree = sample_tree();
        let id = tree.find("docs/nested/b.bin").unwrap();
        assert_eq!(tree[id].size(), 250);
        assert_eq!(tree.relative_path(id), "docs/nested/b.bin");
        assert_eq!(tree.find("/docs//a.txt"), tree.find("docs/a.txt"));
        assert!(tree.find("docs/missing.txt").is_none());
        assert!(tree.find("docs/../top.txt").is_none());
        assert!(tree.find("").is_none());
    }

    #[test]
    fn test_parent_links() {
        let tree = sample_tree();
        let id = tree.find("docs/nested").unwrap();
        let parent = tree[id].parent().unwrap();
        assert_eq!(tree[parent].name(), "docs");
        assert!(tree[parent].parent().is_none());
    }

    #[test]
    fn test_empty_directory_is_leaf_but_directory() {
        let mut tree = FileTree::new();
        let id = tree.add_directory(None, "empty", NodeSource::Remote);
        assert!(tree[id].is_directory());
        assert!(tree[id].is_leaf());
        assert_eq!(tree[id].children(), Some(&[][..]));
        assert_eq!(tree[id].size(), 0);
    }

    #[test]
    fn test_from_local_paths() {
        let dir = tempfile::tempdir().unwrap();
        let share = dir.path().join("share");
        std::fs::create_dir_all(share.join("sub")).unwrap();
        std::fs::create_dir_all(share.join("empty")).unwrap();
        std::fs::write(share.join("one.txt"), vec![b'x'; 100]).unwrap();
        std::fs::write(share.join("sub").join("two.txt"), vec![b'y'; 250]).unwrap();

        let tree = FileTree::from_local_paths(&[&share]).unwrap();
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.file_count(), 2);
        assert_eq!(tree.directory_count(), 3);
        assert_eq!(tree.size(), 350);

        let names: Vec<&str> = tree.walk().into_iter().map(|id| tree[id].name()).collect();
        assert_eq!(names, ["share", "empty", "one.txt", "sub", "two.txt"]);

        let id = tree.find("share/sub/two.txt").unwrap();
        let mut contents = Vec::new();
        tree.open(id).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 250);
    }

    #[test]
    fn test_relative_root_gets_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let share = dir.path().join("share");
        std::fs::create_dir_all(share.join("sub")).unwrap();
        std::fs::write(share.join("a.txt"), b"abc").unwrap();

        let tree = FileTree::from_local_paths(&[share.join("sub").join("..")]).unwrap();
        let root = tree.roots()[0];
        assert_eq!(tree[root].name(), "share");

        let id = tree.find("share/a.txt").unwrap();
        assert_eq!(tree.relative_path(id), "share/a.txt");
        assert_eq!(
            tree[id].local_path(),
            Some(share.canonicalize().unwrap().join("a.txt").as_path())
        );
    }

    #[test]
    fn test_open_rejects_directories_and_remote_nodes() {
        let tree = sample_tree();
        assert!(tree.open(tree.find("docs").unwrap()).is_err());
        assert!(tree.open(tree.find("top.txt").unwrap()).is_err());
    }

    #[test]
    fn test_missing_local_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileTree::from_local_paths(&[dir.path().join("nope")]).is_err());
    }
}
