/// Application name
pub const APP_NAME: &str = "Parley";

/// Chunk size used when streaming file contents to a peer.
/// Interoperating peers expect 8 KiB chunks.
pub const TRANSFER_BUFFER_SIZE: usize = 8192;

/// Size of the session secret a peer sends with an ENCRYPTION message
pub const SESSION_SECRET_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Longest request path a peer may send, in bytes. Replies echo the path,
/// so frames must leave room for it next to a chunk.
pub const MAX_REQUEST_PATH: usize = 4096;

/// Maximum size of one encoded frame on the wire (256 KiB)
pub const MAX_FRAME_SIZE: usize = 262_144;

/// Default TCP listen port for the share server
pub const DEFAULT_SHARE_PORT: u16 = 4600;

/// Key derivation context (BLAKE3) for transport session keys
pub const KDF_CONTEXT_SESSION_KEY: &str = "parley-session-key-v1";
