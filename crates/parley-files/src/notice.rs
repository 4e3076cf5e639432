//! Package announcements sent to peers when the local package list changes.

use parley_shared::protocol::{ATTR_TYPE, ATTR_UUID, NOTICE_TAG};
use parley_shared::{PeerIdentity, Tag};
use uuid::Uuid;

use crate::document::DocumentForm;
use crate::error::DocumentError;
use crate::package::FilePackage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    New,
    Edited,
    Updated,
    Removed,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::New => "n",
            NoticeKind::Edited => "e",
            NoticeKind::Updated => "u",
            NoticeKind::Removed => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "n" => Some(NoticeKind::New),
            "e" => Some(NoticeKind::Edited),
            "u" => Some(NoticeKind::Updated),
            "r" => Some(NoticeKind::Removed),
            _ => None,
        }
    }
}

/// A decoded announcement. `package` is `None` only for removals.
#[derive(Debug, Clone)]
pub struct PackageNotice {
    pub kind: NoticeKind,
    pub uuid: Uuid,
    pub package: Option<FilePackage>,
}

impl PackageNotice {
    /// Build the announcement for `package`. Removals carry only the uuid.
    pub fn announce(kind: NoticeKind, package: &FilePackage) -> Tag {
        let tag = Tag::new(NOTICE_TAG)
            .with_attr(ATTR_TYPE, kind.as_str())
            .with_attr(ATTR_UUID, package.uuid().to_string());
        match kind {
            NoticeKind::Removed => tag,
            _ => tag.with_post(package.to_document(DocumentForm::Remote).into_encoded()),
        }
    }

    pub fn removed(uuid: Uuid) -> Tag {
        Tag::new(NOTICE_TAG)
            .with_attr(ATTR_TYPE, NoticeKind::Removed.as_str())
            .with_attr(ATTR_UUID, uuid.to_string())
    }

    /// Decode an announcement received from `owner`.
    ///
    /// Returns `Ok(None)` for tags that are not notices at all.
    pub fn from_tag(tag: &Tag, owner: Option<PeerIdentity>) -> Result<Option<Self>, DocumentError> {
        if tag.name() != NOTICE_TAG {
            return Ok(None);
        }
        let code = tag
            .attr(ATTR_TYPE)
            .ok_or(DocumentError::MissingAttribute(ATTR_TYPE))?;
        let kind = NoticeKind::from_code(code).ok_or_else(|| DocumentError::InvalidAttribute {
            key: ATTR_TYPE,
            value: code.to_string(),
        })?;
        let uuid_text = tag
            .attr(ATTR_UUID)
            .ok_or(DocumentError::MissingAttribute(ATTR_UUID))?;
        let uuid = Uuid::parse_str(uuid_text).map_err(|_| DocumentError::InvalidAttribute {
            key: ATTR_UUID,
            value: uuid_text.to_string(),
        })?;

        if kind == NoticeKind::Removed {
            return Ok(Some(Self {
                kind,
                uuid,
                package: None,
            }));
        }

        let package = FilePackage::from_remote_document(tag.post(), owner)?;
        if package.uuid() != uuid {
            return Err(DocumentError::Malformed(format!(
                "notice for {uuid} carries package {}",
                package.uuid()
            )));
        }
        Ok(Some(Self {
            kind,
            uuid,
            package: Some(package),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FileTree, NodeSource};
    use crate::visibility::Visibility;

    fn package() -> FilePackage {
        let mut tree = FileTree::new();
        tree.add_file(None, "notes.txt", NodeSource::Local("/tmp/notes.txt".into()), 42);
        FilePackage::new_local("Notes", "weekly", Visibility::public(), tree)
    }

    #[test]
    fn test_announce_new_roundtrip() {
        let pkg = package();
        let tag = PackageNotice::announce(NoticeKind::New, &pkg);
        let wire = Tag::parse(tag.encoded()).unwrap();

        let owner = PeerIdentity::new("erin", Uuid::new_v4());
        let notice = PackageNotice::from_tag(&wire, Some(owner.clone()))
            .unwrap()
            .unwrap();
        assert_eq!(notice.kind, NoticeKind::New);
        assert_eq!(notice.uuid, pkg.uuid());

        let remote = notice.package.unwrap();
        assert_eq!(remote.name, "Notes");
        assert_eq!(remote.size(), 42);
        assert_eq!(remote.owner(), Some(&owner));
        assert!(!remote.is_local());
    }

    #[test]
    fn test_removed_carries_only_uuid() {
        let pkg = package();
        let tag = PackageNotice::announce(NoticeKind::Removed, &pkg);
        assert!(!tag.has_post());
        assert_eq!(tag, PackageNotice::removed(pkg.uuid()));

        let notice = PackageNotice::from_tag(&tag, None).unwrap().unwrap();
        assert_eq!(notice.kind, NoticeKind::Removed);
        assert!(notice.package.is_none());
    }

    #[test]
    fn test_uuid_mismatch_rejected() {
        let pkg = package();
        let tag = Tag::new(NOTICE_TAG)
            .with_attr(ATTR_TYPE, "e")
            .with_attr(ATTR_UUID, Uuid::new_v4().to_string())
            .with_post(pkg.to_document(DocumentForm::Remote).into_encoded());
        assert!(matches!(
            PackageNotice::from_tag(&tag, None),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn test_other_tags_ignored() {
        let tag = Tag::new("m").with_post("hello");
        assert!(PackageNotice::from_tag(&tag, None).unwrap().is_none());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let tag = Tag::new(NOTICE_TAG)
            .with_attr(ATTR_TYPE, "x")
            .with_attr(ATTR_UUID, Uuid::new_v4().to_string());
        assert!(PackageNotice::from_tag(&tag, None).is_err());
    }
}
