// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon bootstrap: wire the services, bind, serve until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use ink_core::Error;
use ink_livelog::{FileLivelog, Livelog, MemoryLivelog};

use crate::handler;
use crate::service::Services;
use crate::storage::MemoryStore;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub addr: SocketAddr,
    /// Livelog cache directory; `None` keeps streams in memory.
    pub livelog_dir: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { addr: crate::env::listen_addr(), livelog_dir: crate::env::livelog_dir() }
    }
}

/// Run the daemon until ctrl-c.
pub async fn run(config: DaemonConfig) -> Result<(), Error> {
    let livelog: Arc<dyn Livelog> = match &config.livelog_dir {
        Some(dir) => Arc::new(
            FileLivelog::new(dir).map_err(|e| Error::internal(e.to_string()))?,
        ),
        None => Arc::new(MemoryLivelog::new()),
    };
    let services = Services::new(Arc::new(MemoryStore::new()), livelog);
    let router = handler::router(services);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| Error::internal(format!("bind {}: {e}", config.addr)))?;
    info!(addr = %config.addr, "daemon listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal(e.to_string()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
