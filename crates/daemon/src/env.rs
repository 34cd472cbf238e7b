// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//! Every knob uses the `INK_` prefix.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon listen address (`INK_ADDR`, default `0.0.0.0:2638`).
pub fn listen_addr() -> SocketAddr {
    std::env::var("INK_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 2638)))
}

/// Livelog cache directory (`INK_LIVELOG_DIR`). Unset means the
/// in-memory backend.
pub fn livelog_dir() -> Option<PathBuf> {
    std::env::var("INK_LIVELOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}
