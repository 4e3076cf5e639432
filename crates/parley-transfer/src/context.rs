//! Everything a session needs from the rest of the application.

use std::sync::Arc;

use parley_files::{ChannelMembership, PackageRegistry};
use parley_shared::constants::TRANSFER_BUFFER_SIZE;
use parley_shared::PeerIdentity;

use crate::membership::StaticMembership;
use crate::sessions::SessionList;

#[derive(Clone)]
pub struct ShareContext {
    /// Who we are, if known
    pub local_user: Option<PeerIdentity>,
    pub membership: Arc<dyn ChannelMembership>,
    pub packages: PackageRegistry,
    pub sessions: SessionList,
    /// Bytes read from disk per chunk
    pub transfer_buffer_size: usize,
}

impl ShareContext {
    pub fn new(packages: PackageRegistry, membership: Arc<dyn ChannelMembership>) -> Self {
        Self {
            local_user: None,
            membership,
            packages,
            sessions: SessionList::new(),
            transfer_buffer_size: TRANSFER_BUFFER_SIZE,
        }
    }

    pub fn with_local_user(mut self, user: PeerIdentity) -> Self {
        self.local_user = Some(user);
        self
    }

    /// A zero size falls back to the default.
    pub fn with_transfer_buffer_size(mut self, size: usize) -> Self {
        self.transfer_buffer_size = if size == 0 { TRANSFER_BUFFER_SIZE } else { size };
        self
    }
}

impl Default for ShareContext {
    fn default() -> Self {
        Self::new(PackageRegistry::new(), Arc::new(StaticMembership::new()))
    }
}

impl std::fmt::Debug for ShareContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareContext")
            .field("local_user", &self.local_user)
            .field("packages", &self.packages.len())
            .field("sessions", &self.sessions.len())
            .field("transfer_buffer_size", &self.transfer_buffer_size)
            .finish()
    }
}
