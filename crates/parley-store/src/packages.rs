use std::fs;
use std::io;

use parley_files::{DocumentForm, FilePackage};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{PackageStore, PACKAGE_EXTENSION};

impl PackageStore {
    /// Write `package` in its local document form, replacing any earlier save.
    pub fn save(&self, package: &FilePackage) -> Result<()> {
        let path = self.path_of(&package.uuid());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, package.to_document(DocumentForm::Local).encoded())?;
        fs::rename(&tmp, &path)?;
        debug!(uuid = %package.uuid(), path = %path.display(), "Saved package");
        Ok(())
    }

    pub fn load(&self, uuid: &Uuid) -> Result<FilePackage> {
        let bytes = fs::read(self.path_of(uuid))?;
        Ok(FilePackage::from_local_document(&bytes)?)
    }

    /// Every saved package that still parses. Broken files are skipped.
    pub fn load_all(&self) -> Result<Vec<FilePackage>> {
        let mut packages = Vec::new();
        for entry in fs::read_dir(self.root())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PACKAGE_EXTENSION) {
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable package");
                    continue;
                }
            };
            match FilePackage::from_local_document(&bytes) {
                Ok(package) => packages.push(package),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed package");
                }
            }
        }

        packages.sort_by_key(|p| p.created_at());
        info!(count = packages.len(), "Loaded saved packages");
        Ok(packages)
    }

    /// Delete the saved document. Returns whether one existed.
    pub fn remove(&self, uuid: &Uuid) -> Result<bool> {
        match fs::remove_file(self.path_of(uuid)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_files::{FileTree, Visibility};

    use super::*;
    use crate::error::StoreError;

    fn shared_dir_package() -> (tempfile::TempDir, FilePackage) {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared");
        fs::create_dir(&shared).unwrap();
        fs::write(shared.join("a.txt"), b"hello").unwrap();
        fs::write(shared.join("b.bin"), [0u8; 64]).unwrap();

        let tree = FileTree::from_local_paths(&[&shared]).unwrap();
        let package = FilePackage::new_local("Shared", "two files", Visibility::public(), tree);
        (dir, package)
    }

    #[test]
    fn save_and_load_round_trip() {
        let (dir, mut package) = shared_dir_package();
        package.set_password(Some("letmein"));
        let store = PackageStore::open_at(&dir.path().join("store")).unwrap();

        store.save(&package).unwrap();
        let loaded = store.load(&package.uuid()).unwrap();

        assert_eq!(loaded.uuid(), package.uuid());
        assert_eq!(loaded.name, "Shared");
        assert_eq!(loaded.size(), 69);
        assert_eq!(loaded.file_count(), 2);
        assert!(loaded.password_protected());

        let id = loaded.tree().find("shared/a.txt").unwrap();
        assert_eq!(
            loaded.tree()[id].local_path(),
            Some(dir.path().join("shared").canonicalize().unwrap().join("a.txt").as_path())
        );
    }

    #[test]
    fn load_all_skips_broken_files() {
        let (dir, package) = shared_dir_package();
        let store = PackageStore::open_at(&dir.path().join("store")).unwrap();
        store.save(&package).unwrap();

        fs::write(store.path_of(&Uuid::new_v4()), b"<p u=\"\"><c><f").unwrap();
        fs::write(store.root().join("notes.txt"), b"ignored").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uuid(), package.uuid());
    }

    #[test]
    fn save_overwrites_previous_version() {
        let (dir, mut package) = shared_dir_package();
        let store = PackageStore::open_at(&dir.path().join("store")).unwrap();
        store.save(&package).unwrap();

        package.description = "edited".into();
        package.record_download();
        store.save(&package).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, "edited");
        assert_eq!(loaded[0].download_count(), 1);
    }

    #[test]
    fn remove_reports_existence() {
        let (dir, package) = shared_dir_package();
        let store = PackageStore::open_at(&dir.path().join("store")).unwrap();
        store.save(&package).unwrap();

        assert!(store.remove(&package.uuid()).unwrap());
        assert!(!store.remove(&package.uuid()).unwrap());
        assert!(matches!(store.load(&package.uuid()), Err(StoreError::Io(_))));
    }
}
