// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side client contract against the daemon's `/api/client/v1`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use ink_core::{Data, Stage, Step};
use ink_livelog::Line;

/// A client pool; each worker slot takes its own session handle.
pub trait Client: Send + Sync {
    fn v1(&self) -> Arc<dyn ClientV1>;
}

/// One worker slot's session with the daemon.
#[async_trait]
pub trait ClientV1: Send + Sync {
    /// The slot name, recorded on accepted stages.
    fn name(&self) -> &str;

    async fn status(&self) -> Result<(), ClientError>;
    /// Long-poll for the next dispatched stage. Implementations reconnect
    /// on transport deadlines.
    async fn request(&self) -> Result<Stage, ClientError>;
    async fn accept(&self, stage_id: u64) -> Result<(), ClientError>;
    async fn info(&self, stage_id: u64) -> Result<Data, ClientError>;
    async fn stage_begin(&self, stage: &Stage) -> Result<(), ClientError>;
    async fn stage_end(&self, stage: &Stage) -> Result<(), ClientError>;
    async fn step_begin(&self, step: &Step) -> Result<(), ClientError>;
    async fn step_end(&self, step: &Step) -> Result<(), ClientError>;
    async fn log_upload(&self, step_id: u64, lines: &[Line], all: bool)
        -> Result<(), ClientError>;
    /// Long-poll until the build is canceled. Implementations reconnect
    /// on transport deadlines, so success means "canceled".
    async fn watch_cancel(&self, build_id: u64) -> Result<(), ClientError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// A typed sentinel mapped back from the error body.
    #[error(transparent)]
    Api(#[from] ink_core::Error),

    #[error("code: {code}, error: {message}")]
    Http { code: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, ClientError::Api(ink_core::Error::DeadlineExceeded))
    }

    /// The stage-already-assigned rejection from `accept`.
    pub fn is_claim_conflict(&self) -> bool {
        match self {
            ClientError::Http { message, .. } => message.contains("already assigned"),
            _ => false,
        }
    }
}
