//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use parley_shared::constants::{
    DEFAULT_SHARE_PORT, MAX_FRAME_SIZE, MAX_REQUEST_PATH, TRANSFER_BUFFER_SIZE,
};
use parley_transfer::StaticMembership;

/// Room left in a frame around a chunk: the echoed request path (base64),
/// the rest of the tag head and the cipher nonce and MAC.
const FRAME_OVERHEAD: usize = MAX_REQUEST_PATH.div_ceil(3) * 4 + 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address to accept share connections on.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:4600`
    pub listen_addr: SocketAddr,

    /// Bytes per streamed chunk.
    /// Env: `TRANSFER_BUFFER_SIZE`
    /// Default: `8192`
    pub transfer_buffer_size: usize,

    /// Largest frame accepted or sent. Always leaves room for one chunk.
    /// Env: `MAX_FRAME_SIZE`
    pub max_frame_size: usize,

    /// Package store directory.
    /// Env: `DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Paths shared as one public package for the lifetime of the process.
    /// Env: `SHARE_PATHS` (`:`-separated)
    pub share_paths: Vec<PathBuf>,

    /// Name of the package built from `share_paths`.
    /// Env: `SHARE_NAME`
    pub share_name: String,

    /// Optional password for the package built from `share_paths`.
    /// Env: `SHARE_PASSWORD`
    pub share_password: Option<String>,

    /// Static channel table used for channel visibility.
    /// Env: `CHANNEL_MEMBERS` (`chan=uuid,uuid;chan2=uuid`)
    pub membership: StaticMembership,

    /// Seconds between saves of download counters.
    /// Env: `SAVE_INTERVAL_SECS`
    /// Default: `60`
    pub save_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_SHARE_PORT).into(),
            transfer_buffer_size: TRANSFER_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
            data_dir: None,
            share_paths: Vec::new(),
            share_name: "Shared files".to_string(),
            share_password: None,
            membership: StaticMembership::new(),
            save_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.listen_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid LISTEN_ADDR, using default"),
            }
        }

        if let Some(val) = lookup("TRANSFER_BUFFER_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.transfer_buffer_size = n,
                _ => tracing::warn!(value = %val, "Invalid TRANSFER_BUFFER_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("MAX_FRAME_SIZE") {
            match val.parse::<usize>() {
                Ok(n) => config.max_frame_size = n,
                Err(_) => tracing::warn!(value = %val, "Invalid MAX_FRAME_SIZE, using default"),
            }
        }
        let min_frame = config.transfer_buffer_size + FRAME_OVERHEAD;
        if config.max_frame_size < min_frame {
            tracing::warn!(
                max_frame_size = config.max_frame_size,
                min_frame,
                "MAX_FRAME_SIZE cannot hold a chunk, raising it"
            );
            config.max_frame_size = min_frame;
        }

        if let Some(dir) = lookup("DATA_DIR").filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(paths) = lookup("SHARE_PATHS") {
            config.share_paths = paths
                .split(':')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Some(name) = lookup("SHARE_NAME").filter(|n| !n.trim().is_empty()) {
            config.share_name = name;
        }

        if let Some(password) = lookup("SHARE_PASSWORD").filter(|p| !p.is_empty()) {
            config.share_password = Some(password);
        }

        if let Some(table) = lookup("CHANNEL_MEMBERS") {
            config.membership = StaticMembership::parse(&table);
        }

        if let Some(val) = lookup("SAVE_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.save_interval_secs = n,
                _ => tracing::warn!(value = %val, "Invalid SAVE_INTERVAL_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
