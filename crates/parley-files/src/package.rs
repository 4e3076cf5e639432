//! File packages: a named, access-controlled envelope around a file tree.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use parley_shared::crypto::{hash_password, verify_password_hash};
use parley_shared::{PeerIdentity, Tag};
use tracing::debug;
use uuid::Uuid;

use crate::document::{parse_tree, write_tree, DocumentForm, PACKAGE_TAG};
use crate::error::DocumentError;
use crate::tree::FileTree;
use crate::visibility::{Visibility, VisibilityKind};

const ATTR_UUID: &str = "u";
const ATTR_NAME: &str = "n";
const ATTR_DESCRIPTION: &str = "d";
const ATTR_CREATED: &str = "c";
const ATTR_DOWNLOADS: &str = "dc";
const ATTR_VISIBILITY: &str = "v";
const ATTR_VISIBILITY_DATA: &str = "p";
const ATTR_DISCOVERED: &str = "vd";
const ATTR_ACTIVE: &str = "a";
const ATTR_PASSWORD_HASH: &str = "pk";
const ATTR_PASSWORD_PROTECTED: &str = "pp";

/// Local packages are served from disk; remote ones were announced by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageKind {
    Local {
        password_hash: Option<String>,
    },
    Remote {
        owner: Option<PeerIdentity>,
        password_protected: bool,
    },
}

/// Sums over the whole tree, memoized per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aggregates {
    pub size: u64,
    pub file_count: usize,
    pub directory_count: usize,
}

#[derive(Debug, Clone)]
pub struct FilePackage {
    uuid: Uuid,
    pub name: String,
    pub description: String,
    created_at: DateTime<Utc>,
    pub visibility: Visibility,
    download_count: u64,
    pub active: bool,
    kind: PackageKind,
    tree: FileTree,
    aggregates: OnceLock<Aggregates>,
}

impl FilePackage {
    /// Create a new local package with a fresh uuid.
    pub fn new_local(
        name: impl Into<String>,
        description: impl Into<String>,
        visibility: Visibility,
        tree: FileTree,
    ) -> Self {
        let created_at = DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis())
            .unwrap_or_else(Utc::now);
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            created_at,
            visibility,
            download_count: 0,
            active: true,
            kind: PackageKind::Local {
                password_hash: None,
            },
            tree,
            aggregates: OnceLock::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn download_count(&self) -> u64 {
        self.download_count
    }

    pub fn record_download(&mut self) -> u64 {
        self.download_count = self.download_count.saturating_add(1);
        self.download_count
    }

    pub fn kind(&self) -> &PackageKind {
        &self.kind
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, PackageKind::Local { .. })
    }

    pub fn owner(&self) -> Option<&PeerIdentity> {
        match &self.kind {
            PackageKind::Remote { owner, .. } => owner.as_ref(),
            PackageKind::Local { .. } => None,
        }
    }

    pub fn password_protected(&self) -> bool {
        match &self.kind {
            PackageKind::Local { password_hash } => password_hash.is_some(),
            PackageKind::Remote {
                password_protected, ..
            } => *password_protected,
        }
    }

    /// Set or clear the password of a local package. Empty clears it.
    pub fn set_password(&mut self, password: Option<&str>) {
        if let PackageKind::Local { password_hash } = &mut self.kind {
            *password_hash = password.filter(|p| !p.is_empty()).map(hash_password);
        }
    }

    /// Check a submitted password hash. Packages without a password accept
    /// anything; remote packages cannot be verified locally.
    pub fn verify_password(&self, submitted_hash: &str) -> bool {
        match &self.kind {
            PackageKind::Local {
                password_hash: None,
            } => true,
            PackageKind::Local {
                password_hash: Some(stored),
            } => verify_password_hash(stored, submitted_hash),
            PackageKind::Remote { .. } => false,
        }
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    /// Replace the tree, dropping the memoized aggregates.
    pub fn set_tree(&mut self, tree: FileTree) {
        self.tree = tree;
        self.aggregates = OnceLock::new();
    }

    pub fn aggregates(&self) -> Aggregates {
        *self.aggregates.get_or_init(|| Aggregates {
            size: self.tree.size(),
            file_count: self.tree.file_count(),
            directory_count: self.tree.directory_count(),
        })
    }

    pub fn size(&self) -> u64 {
        self.aggregates().size
    }

    pub fn file_count(&self) -> usize {
        self.aggregates().file_count
    }

    pub fn directory_count(&self) -> usize {
        self.aggregates().directory_count
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Serialize the package. The local form keeps filesystem paths, the
    /// password hash and the active flag; the remote form keeps only what a
    /// peer may know.
    pub fn to_document(&self, form: DocumentForm) -> Tag {
        let mut head = Tag::new(PACKAGE_TAG)
            .with_attr(ATTR_UUID, self.uuid.to_string())
            .with_attr(ATTR_NAME, self.name.clone())
            .with_attr(ATTR_DESCRIPTION, self.description.clone())
            .with_attr(ATTR_CREATED, self.created_at.timestamp_millis().to_string())
            .with_attr(ATTR_DOWNLOADS, self.download_count.to_string())
            .with_attr(ATTR_VISIBILITY, self.visibility.kind.as_str());

        let share_data = form == DocumentForm::Local
            || self.visibility.kind != VisibilityKind::Private;
        if share_data && !self.visibility.data.is_empty() {
            head = head.with_attr(ATTR_VISIBILITY_DATA, self.visibility.data.clone());
        }

        match form {
            DocumentForm::Local => {
                head = head.with_attr(ATTR_ACTIVE, if self.active { "1" } else { "0" });
                if self.visibility.discovered {
                    head = head.with_attr(ATTR_DISCOVERED, "1");
                }
                if let PackageKind::Local {
                    password_hash: Some(hash),
                } = &self.kind
                {
                    head = head.with_attr(ATTR_PASSWORD_HASH, hash.clone());
                }
            }
            DocumentForm::Remote => {
                if self.password_protected() {
                    head = head.with_attr(ATTR_PASSWORD_PROTECTED, "1");
                }
            }
        }

        head.with_post(write_tree(&self.tree, form))
    }

    /// Load a package saved by [`FilePackage::to_document`] in local form.
    pub fn from_local_document(bytes: &[u8]) -> Result<Self, DocumentError> {
        let head = parse_head(bytes)?;
        let kind = PackageKind::Local {
            password_hash: head
                .attr(ATTR_PASSWORD_HASH)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
        };
        Self::from_head(&head, kind)
    }

    /// Decode a package announced by `owner`.
    pub fn from_remote_document(
        bytes: &[u8],
        owner: Option<PeerIdentity>,
    ) -> Result<Self, DocumentError> {
        let head = parse_head(bytes)?;
        let kind = PackageKind::Remote {
            owner,
            password_protected: head.attr_flag(ATTR_PASSWORD_PROTECTED),
        };
        Self::from_head(&head, kind)
    }

    fn from_head(head: &Tag, kind: PackageKind) -> Result<Self, DocumentError> {
        let uuid_text = required(head, ATTR_UUID)?;
        let uuid = Uuid::parse_str(uuid_text).map_err(|_| DocumentError::InvalidAttribute {
            key: ATTR_UUID,
            value: uuid_text.to_string(),
        })?;

        let created_at = match head.attr(ATTR_CREATED) {
            Some(millis) => millis
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| DocumentError::InvalidAttribute {
                    key: ATTR_CREATED,
                    value: millis.to_string(),
                })?,
            None => return Err(DocumentError::MissingAttribute(ATTR_CREATED)),
        };

        let download_count = match head.attr(ATTR_DOWNLOADS) {
            Some(count) => {
                count
                    .trim()
                    .parse()
                    .map_err(|_| DocumentError::InvalidAttribute {
                        key: ATTR_DOWNLOADS,
                        value: count.to_string(),
                    })?
            }
            None => 0,
        };

        let visibility_kind = match head.attr(ATTR_VISIBILITY) {
            Some(kind) => kind
                .parse::<VisibilityKind>()
                .map_err(|_| DocumentError::InvalidAttribute {
                    key: ATTR_VISIBILITY,
                    value: kind.to_string(),
                })?,
            None => VisibilityKind::Public,
        };

        let tree = parse_tree(head.post())?;

        let package = Self {
            uuid,
            name: required(head, ATTR_NAME)?.to_string(),
            description: head.attr(ATTR_DESCRIPTION).unwrap_or_default().to_string(),
            created_at,
            visibility: Visibility {
                kind: visibility_kind,
                data: head
                    .attr(ATTR_VISIBILITY_DATA)
                    .unwrap_or_default()
                    .to_string(),
                discovered: head.attr_flag(ATTR_DISCOVERED),
            },
            download_count,
            active: head.attr(ATTR_ACTIVE).map_or(true, |a| a != "0"),
            kind,
            tree,
            aggregates: OnceLock::new(),
        };

        debug!(
            uuid = %package.uuid,
            name = %package.name,
            local = package.is_local(),
            "Decoded package document"
        );
        Ok(package)
    }
}

fn parse_head(bytes: &[u8]) -> Result<Tag, DocumentError> {
    let head = Tag::parse(bytes)?;
    if head.name() != PACKAGE_TAG {
        return Err(DocumentError::Malformed(format!(
            "expected <{PACKAGE_TAG}>, found <{}>",
            head.name()
        )));
    }
    Ok(head)
}

fn required<'a>(head: &'a Tag, key: &'static str) -> Result<&'a str, DocumentError> {
    head.attr(key).ok_or(DocumentError::MissingAttribute(key))
}
