use parley_shared::protocol::Status;
use parley_shared::{CryptoError, TagError};
use thiserror::Error;

/// Failures of the connection itself. These end the session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Tag error: {0}")]
    Tag(#[from] TagError),
}

/// A refused or failed request. Always answered with a status reply; the
/// session stays open.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Access denied")]
    AccessDenied,

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transfer IO error: {0}")]
    TransferIo(#[source] std::io::Error),
}

impl SessionError {
    /// The status code sent to the peer for this error.
    pub fn status(&self) -> Status {
        match self {
            SessionError::AccessDenied => Status::AccessDenied,
            SessionError::NotAuthenticated => Status::AuthRequired,
            SessionError::NotFound(_) => Status::NotFound,
            SessionError::TransferIo(_) => Status::IoError,
        }
    }
}
