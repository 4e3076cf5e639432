//! The shared id → package map.
//!
//! Every session reads from it while UI-driven actions add and remove
//! packages, so all access goes through this narrow API behind one lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parley_shared::PeerIdentity;
use tracing::{debug, info};
use uuid::Uuid;

use crate::package::FilePackage;
use crate::visibility::ChannelMembership;

#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: Arc<RwLock<HashMap<Uuid, FilePackage>>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, returning the one it replaced.
    pub fn insert(&self, package: FilePackage) -> Option<FilePackage> {
        let uuid = package.uuid();
        info!(
            uuid = %uuid,
            name = %package.name,
            files = package.file_count(),
            size = package.size(),
            "Registered package"
        );
        self.packages.write().insert(uuid, package)
    }

    pub fn remove(&self, uuid: &Uuid) -> Option<FilePackage> {
        let removed = self.packages.write().remove(uuid);
        if removed.is_some() {
            info!(uuid = %uuid, "Removed package");
        }
        removed
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.packages.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().is_empty()
    }

    /// Run `f` against a package under the read lock.
    pub fn with_package<R>(&self, uuid: &Uuid, f: impl FnOnce(&FilePackage) -> R) -> Option<R> {
        self.packages.read().get(uuid).map(f)
    }

    /// Run `f` against a package under the write lock.
    pub fn update<R>(&self, uuid: &Uuid, f: impl FnOnce(&mut FilePackage) -> R) -> Option<R> {
        self.packages.write().get_mut(uuid).map(f)
    }

    pub fn record_download(&self, uuid: &Uuid) -> Option<u64> {
        let count = self.update(uuid, FilePackage::record_download);
        if let Some(count) = count {
            debug!(uuid = %uuid, downloads = count, "Recorded download");
        }
        count
    }

    /// Try the key against every private package; returns how many it unlocked.
    pub fn discover(&self, key: &str) -> usize {
        let mut unlocked = 0;
        for package in self.packages.write().values_mut() {
            if !package.visibility.discovered && package.visibility.discover(key) {
                debug!(uuid = %package.uuid(), "Discovered private package");
                unlocked += 1;
            }
        }
        unlocked
    }

    /// Copy of every package.
    pub fn snapshot(&self) -> Vec<FilePackage> {
        self.packages.read().values().cloned().collect()
    }

    /// Active local packages `peer` may learn about and download from.
    pub fn listable_for(
        &self,
        peer: &PeerIdentity,
        membership: &dyn ChannelMembership,
    ) -> Vec<FilePackage> {
        self.packages
            .read()
            .values()
            .filter(|p| {
                p.is_local()
                    && p.active
                    && p.visibility.listable()
                    && p.visibility.permits(peer, membership)
            })
            .cloned()
            .collect()
    }
}
