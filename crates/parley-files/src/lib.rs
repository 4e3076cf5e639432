//! File trees, packages and their tag documents.

pub mod document;
pub mod error;
pub mod notice;
pub mod package;
pub mod registry;
pub mod tree;
pub mod visibility;

pub use document::{parse_tree, write_tree, DocumentForm};
pub use error::{DocumentError, TreeError};
pub use notice::{NoticeKind, PackageNotice};
pub use package::{Aggregates, FilePackage, PackageKind};
pub use registry::PackageRegistry;
pub use tree::{FileNode, FileTree, NodeId, NodeSource};
pub use visibility::{ChannelMembership, Visibility, VisibilityKind};
