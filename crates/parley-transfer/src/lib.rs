//! File transfer sessions over framed TCP connections.

pub mod context;
pub mod error;
pub mod membership;
pub mod session;
pub mod sessions;
pub mod transport;

pub use context::ShareContext;
pub use error::{SessionError, TransportError};
pub use membership::StaticMembership;
pub use session::{SessionState, TransferSession};
pub use sessions::{SessionHandle, SessionList};
pub use transport::{FrameReader, FramedTransport, Transport};
