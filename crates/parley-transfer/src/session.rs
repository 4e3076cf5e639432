//! Per-connection transfer session.
//!
//! A session authenticates the peer against one package's visibility and
//! password, then streams requested files in fixed-size chunks. Refusals
//! and I/O failures are answered with status replies; only a broken
//! transport ends the session.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parley_files::VisibilityKind;
use parley_shared::constants::MAX_REQUEST_PATH;
use parley_shared::crypto::session_secret_from_slice;
use parley_shared::protocol::{self, ShareMessage, Status};
use parley_shared::{PeerIdentity, SessionId, Tag};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ShareContext;
use crate::error::{SessionError, TransportError};
use crate::sessions::SessionHandle;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// A password-protected package is selected but not yet unlocked
    PackageSelected,
    Authenticated,
    Streaming,
    Closed,
}

pub struct TransferSession<T: Transport> {
    id: SessionId,
    context: ShareContext,
    transport: T,
    peer: Option<PeerIdentity>,
    package: Option<Uuid>,
    state: SessionState,
    running: Arc<AtomicBool>,
}

impl<T: Transport> TransferSession<T> {
    /// Create a session and register it with the context's session list.
    pub fn new(context: ShareContext, transport: T, peer: Option<PeerIdentity>) -> Self {
        let id = SessionId::new();
        let running = Arc::new(AtomicBool::new(true));
        context
            .sessions
            .register(SessionHandle::new(id, peer.clone(), running.clone()));

        info!(session = %id, peer = ?peer.as_ref().map(|p| p.to_string()), "Transfer session opened");

        Self {
            id,
            context,
            transport,
            peer,
            package: None,
            state: SessionState::Unauthenticated,
            running,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn package(&self) -> Option<Uuid> {
        self.package
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated | SessionState::Streaming
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared cancellation flag. Clearing it stops an in-flight stream.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Decode a raw frame with the transport and dispatch it.
    /// Undecodable frames are dropped.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self.transport.open(frame) {
            Ok(tag) => self.handle(&tag),
            Err(e) => {
                warn!(session = %self.id, error = %e, "Dropping undecodable frame");
                Ok(())
            }
        }
    }

    /// Dispatch one received tag. Errors mean the transport failed.
    pub fn handle(&mut self, tag: &Tag) -> Result<(), TransportError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let Some(message) = ShareMessage::from_tag(tag) else {
            debug!(session = %self.id, tag = %tag.name(), "Ignoring non-share tag");
            return Ok(());
        };

        match message {
            ShareMessage::Encryption(payload) => self.on_encryption(&payload),
            ShareMessage::Select { package, peer } => {
                if let Some(claimed) = peer {
                    debug!(session = %self.id, claimed = %claimed, "Ignoring self-declared peer identity");
                }
                self.on_select(&package)
            }
            ShareMessage::Password(hash) => self.on_password(&hash),
            ShareMessage::Request(path) => self.on_request(&path),
            ShareMessage::Unknown(kind) => {
                debug!(session = %self.id, kind, "Ignoring unknown share message");
                Ok(())
            }
        }
    }

    fn on_encryption(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match session_secret_from_slice(payload) {
            Ok(secret) => {
                self.transport.send(&protocol::encryption_reply(true))?;
                self.transport.install_cipher(&secret);
                info!(session = %self.id, "Session encrypted");
            }
            Err(_) => {
                warn!(session = %self.id, len = payload.len(), "Rejecting session secret");
                self.transport.send(&protocol::encryption_reply(false))?;
            }
        }
        Ok(())
    }

    /// Only the identity the session was opened with counts for visibility.
    fn on_select(&mut self, package: &str) -> Result<(), TransportError> {
        let status = match self.select(package) {
            Ok(status) => status,
            Err(e) => {
                debug!(session = %self.id, package, error = %e, "Package selection refused");
                self.package = None;
                self.state = SessionState::Unauthenticated;
                e.status()
            }
        };

        self.context
            .sessions
            .update(&self.id, self.peer.as_ref(), self.package);
        self.transport.send(&protocol::select_reply(status))
    }

    fn select(&mut self, package: &str) -> Result<Status, SessionError> {
        let uuid =
            Uuid::parse_str(package.trim()).map_err(|_| SessionError::NotFound(package.into()))?;

        let (visibility, protected) = self
            .context
            .packages
            .with_package(&uuid, |p| {
                (p.is_local() && p.active).then(|| (p.visibility.clone(), p.password_protected()))
            })
            .flatten()
            .ok_or_else(|| SessionError::NotFound(package.into()))?;

        let permitted = match &self.peer {
            Some(peer) => visibility.permits(peer, &*self.context.membership),
            None => matches!(
                visibility.kind,
                VisibilityKind::Public | VisibilityKind::Private
            ),
        };
        if !permitted {
            return Err(SessionError::AccessDenied);
        }

        self.package = Some(uuid);
        if protected {
            self.state = SessionState::PackageSelected;
            Ok(Status::AuthRequired)
        } else {
            self.state = SessionState::Authenticated;
            Ok(Status::Selected)
        }
    }

    fn on_password(&mut self, hash: &str) -> Result<(), TransportError> {
        let accepted = self.package.map_or(false, |uuid| {
            self.context
                .packages
                .with_package(&uuid, |p| p.verify_password(hash))
                .unwrap_or(false)
        });

        if accepted {
            self.state = SessionState::Authenticated;
        }
        debug!(session = %self.id, accepted, "Password submitted");
        self.transport.send(&protocol::password_reply(accepted))
    }

    fn on_request(&mut self, path: &str) -> Result<(), TransportError> {
        if path.len() > MAX_REQUEST_PATH {
            debug!(session = %self.id, len = path.len(), "Request path too long");
            return self
                .transport
                .send(&protocol::request_status("", Status::NotFound));
        }

        let status = match self.resolve(path) {
            Ok(local) => self.stream(path, local)?,
            Err(e) => {
                debug!(session = %self.id, path, error = %e, "Request refused");
                e.status()
            }
        };
        self.transport.send(&protocol::request_status(path, status))
    }

    /// Map a request path to the file on disk.
    fn resolve(&self, path: &str) -> Result<PathBuf, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let uuid = self
            .package
            .ok_or(SessionError::NotAuthenticated)?;

        self.context
            .packages
            .with_package(&uuid, |p| {
                if !p.active {
                    return None;
                }
                let id = p.tree().find(path)?;
                let node = &p.tree()[id];
                if node.is_directory() {
                    return None;
                }
                node.local_path().map(|l| l.to_path_buf())
            })
            .flatten()
            .ok_or_else(|| SessionError::NotFound(path.into()))
    }

    /// Send the file in chunks. Returns the final status; only transport
    /// failures are errors.
    fn stream(&mut self, path: &str, local: PathBuf) -> Result<Status, TransportError> {
        let mut file = match File::open(&local) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(session = %self.id, path = %local.display(), "Shared file vanished");
                return Ok(Status::NotFound);
            }
            Err(e) => {
                let e = SessionError::TransferIo(e);
                warn!(session = %self.id, path = %local.display(), error = %e, "Cannot open shared file");
                return Ok(e.status());
            }
        };

        self.state = SessionState::Streaming;
        info!(session = %self.id, path, "Streaming file");

        let mut buffer = vec![0u8; self.context.transfer_buffer_size];
        let mut sent: u64 = 0;
        let status = loop {
            if !self.is_running() {
                break Status::Cancelled;
            }
            let n = match file.read(&mut buffer) {
                Ok(0) => break Status::Done,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let e = SessionError::TransferIo(e);
                    warn!(session = %self.id, path, error = %e, "Read failed mid-transfer");
                    break e.status();
                }
            };
            if let Err(e) = self.transport.send(&protocol::chunk(path, &buffer[..n])) {
                self.state = SessionState::Authenticated;
                return Err(e);
            }
            sent += n as u64;
        };

        self.state = SessionState::Authenticated;
        info!(session = %self.id, path, bytes = sent, status = %status, "Stream finished");

        if status == Status::Done {
            if let Some(uuid) = self.package {
                self.context.packages.record_download(&uuid);
            }
        }
        Ok(status)
    }

    /// Stop the session, close the transport and deregister. Safe to call
    /// more than once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.state = SessionState::Closed;
        self.transport.close();
        self.context.sessions.deregister(&self.id);
        info!(session = %self.id, "Transfer session closed");
    }
}

impl<T: Transport> Drop for TransferSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
