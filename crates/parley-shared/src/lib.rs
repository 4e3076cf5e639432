//! Wire format, protocol literals and crypto shared by every Parley crate.

pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod tag;
pub mod types;

pub use error::{CryptoError, TagError};
pub use tag::{Tag, TagHead};
pub use types::{PeerIdentity, SessionId};
