//! Tracking of live transfer sessions.
//!
//! Each session registers a [`SessionHandle`] on creation and removes it
//! exactly once on close. Other threads use the handles to cancel sessions,
//! e.g. every session reading from a package that was just removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use parley_shared::{PeerIdentity, SessionId};
use tracing::debug;
use uuid::Uuid;

/// Shared view of one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub peer: Option<PeerIdentity>,
    pub package: Option<Uuid>,
    running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn new(id: SessionId, peer: Option<PeerIdentity>, running: Arc<AtomicBool>) -> Self {
        Self {
            id,
            peer,
            package: None,
            running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the session to stop. An in-flight stream ends with `c`.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionList {
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
}

impl SessionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        debug!(session = %handle.id, "Registered session");
        self.sessions.lock().insert(handle.id, handle);
    }

    /// Remove a session. Returns whether it was still registered.
    pub fn deregister(&self, id: &SessionId) -> bool {
        let removed = self.sessions.lock().remove(id).is_some();
        if removed {
            debug!(session = %id, "Deregistered session");
        }
        removed
    }

    /// Update what a registered session knows about its peer and package.
    pub fn update(&self, id: &SessionId, peer: Option<&PeerIdentity>, package: Option<Uuid>) {
        if let Some(handle) = self.sessions.lock().get_mut(id) {
            if let Some(peer) = peer {
                handle.peer = Some(peer.clone());
            }
            handle.package = package;
        }
    }

    /// Cancel every session matching `predicate`; returns how many.
    pub fn close_matching(&self, predicate: impl Fn(&SessionHandle) -> bool) -> usize {
        let sessions = self.sessions.lock();
        let mut closed = 0;
        for handle in sessions.values().filter(|h| predicate(h)) {
            handle.cancel();
            closed += 1;
        }
        if closed > 0 {
            debug!(count = closed, "Cancelled sessions");
        }
        closed
    }

    /// Cancel every session serving `package`.
    pub fn close_package(&self, package: &Uuid) -> usize {
        self.close_matching(|h| h.package.as_ref() == Some(package))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SessionHandle {
        SessionHandle::new(SessionId::new(), None, Arc::new(AtomicBool::new(true)))
    }

    #[test]
    fn test_deregister_exactly_once() {
        let list = SessionList::new();
        let h = handle();
        let id = h.id;
        list.register(h);
        assert_eq!(list.len(), 1);
        assert!(list.deregister(&id));
        assert!(!list.deregister(&id));
        assert!(list.is_empty());
    }

    #[test]
    fn test_close_package_cancels_matching_only() {
        let list = SessionList::new();
        let package = Uuid::new_v4();

        let serving = handle();
        let idle = handle();
        list.register(serving.clone());
        list.register(idle.clone());
        list.update(&serving.id, None, Some(package));

        assert_eq!(list.close_package(&package), 1);
        assert!(!serving.is_running());
        assert!(idle.is_running());
    }

    #[test]
    fn test_update_records_peer() {
        let list = SessionList::new();
        let h = handle();
        list.register(h.clone());

        let peer = PeerIdentity::new("frank", Uuid::new_v4());
        list.update(&h.id, Some(&peer), None);

        let snapshot = list.snapshot();
        assert_eq!(snapshot[0].peer.as_ref(), Some(&peer));
        assert!(snapshot[0].package.is_none());
    }
}
