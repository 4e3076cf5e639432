//! Package store directory management.
//!
//! The [`PackageStore`] owns a directory holding one `<uuid>.pkg` file per
//! local package.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use parley_shared::constants::APP_NAME;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// File extension of saved package documents.
pub const PACKAGE_EXTENSION: &str = "pkg";

/// Handle on the package store directory.
#[derive(Debug, Clone)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    /// Open (or create) the default package store.
    ///
    /// The directory is `packages` under the platform data directory
    /// (`~/.local/share/parley/packages` on Linux).
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("org", APP_NAME, APP_NAME).ok_or(StoreError::NoDataDir)?;

        let root = project_dirs.data_dir().join("packages");

        info!(path = %root.display(), "Opening package store");

        Self::open_at(&root)
    }

    /// Open (or create) a store at an explicit directory.
    pub fn open_at(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `uuid`, whether or not it exists.
    pub fn path_of(&self, uuid: &Uuid) -> PathBuf {
        self.root.join(format!("{uuid}.{PACKAGE_EXTENSION}"))
    }
}
