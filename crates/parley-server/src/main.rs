//! # parley-server
//!
//! Standalone share server for Parley file packages.
//!
//! This binary provides:
//! - the **package store**: saved local packages are loaded at startup and
//!   their download counters written back periodically
//! - an optional **ad-hoc share** built from `SHARE_PATHS`
//! - a **TCP listener** speaking the framed file-share protocol, one
//!   blocking transfer session per connection

mod config;
mod connection;

use std::sync::Arc;
use std::time::Duration;

use parley_files::{FilePackage, FileTree, PackageRegistry, Visibility};
use parley_store::PackageStore;
use parley_transfer::ShareContext;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley share server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Load packages
    // -----------------------------------------------------------------------
    let store = match &config.data_dir {
        Some(dir) => PackageStore::open_at(dir)?,
        None => PackageStore::open_default()?,
    };

    let registry = PackageRegistry::new();
    for package in store.load_all()? {
        registry.insert(package);
    }

    let ephemeral = build_share_package(&config)?;
    if let Some(package) = ephemeral.clone() {
        registry.insert(package);
    }
    let ephemeral_id = ephemeral.map(|p| p.uuid());

    info!(packages = registry.len(), "Package registry ready");

    let context = ShareContext::new(registry.clone(), Arc::new(config.membership.clone()))
        .with_transfer_buffer_size(config.transfer_buffer_size);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic save of download counters
    let saver_store = store.clone();
    let saver_registry = registry.clone();
    let save_interval = Duration::from_secs(config.save_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(save_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            let store = saver_store.clone();
            let registry = saver_registry.clone();
            let saved =
                tokio::task::spawn_blocking(move || save_packages(&store, &registry, ephemeral_id))
                    .await;
            if let Err(e) = saved {
                error!(error = %e, "Package save task failed");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Accept connections (blocks until shutdown)
    // -----------------------------------------------------------------------
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Share server listening");

    tokio::select! {
        result = accept_loop(listener, context.clone(), config.max_frame_size) => {
            if let Err(e) = result {
                error!(error = %e, "Listener failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    let cancelled = context.sessions.close_matching(|_| true);
    info!(sessions = cancelled, "Cancelled open sessions");
    save_packages(&store, &registry, ephemeral_id);

    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    context: ShareContext,
    max_frame_size: usize,
) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let stream = stream.into_std()?;
        stream.set_nonblocking(false)?;

        let context = context.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = connection::serve_connection(stream, context, max_frame_size) {
                warn!(peer = %addr, error = %e, "Connection ended with error");
            }
        });
    }
}

/// The public package described by `SHARE_PATHS`, if any.
fn build_share_package(config: &ServerConfig) -> anyhow::Result<Option<FilePackage>> {
    if config.share_paths.is_empty() {
        return Ok(None);
    }

    let tree = FileTree::from_local_paths(&config.share_paths)?;
    let mut package = FilePackage::new_local(
        config.share_name.clone(),
        String::new(),
        Visibility::public(),
        tree,
    );
    package.set_password(config.share_password.as_deref());

    info!(
        uuid = %package.uuid(),
        name = %package.name,
        files = package.file_count(),
        size = package.size(),
        protected = package.password_protected(),
        "Sharing paths"
    );
    Ok(Some(package))
}

/// Write every stored package back. The ad-hoc share is never persisted.
fn save_packages(store: &PackageStore, registry: &PackageRegistry, skip: Option<Uuid>) {
    for package in registry.snapshot() {
        if Some(package.uuid()) == skip || !package.is_local() {
            continue;
        }
        if let Err(e) = store.save(&package) {
            warn!(uuid = %package.uuid(), error = %e, "Failed to save package");
        }
    }
}
