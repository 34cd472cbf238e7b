// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution hooks: the abstract contract over concrete runtimes.
//!
//! `begin` must be paired with `end`; `step` must not be invoked after
//! `end`; writers passed to `step` are closed by the caller. `end` must
//! release everything on every exit path and stay idempotent.

pub mod docker;
pub mod host;

pub use docker::DockerHook;
pub use host::HostHook;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use ink_livelog::StreamWriter;

use crate::spec::{RuntimeStep, RuntimeWorkflow};

/// Terminal state of one executed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepState {
    pub exit_code: i32,
    pub oom_killed: bool,
}

#[derive(Debug, Error)]
pub enum HookError {
    /// The step was interrupted by cooperative cancellation.
    #[error("canceled")]
    Canceled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// Prepare stage resources. May rewrite the spec (script
    /// materialization, runtime ids).
    async fn begin(&self, spec: &mut RuntimeWorkflow) -> Result<(), HookError>;

    /// Release stage resources deterministically; idempotent.
    async fn end(&self, spec: &RuntimeWorkflow) -> Result<(), HookError>;

    /// Execute one step, writing all output bytes to `writer` and
    /// honoring the token by terminating the underlying process. A step
    /// with nothing to run returns `Ok(None)`.
    async fn step(
        &self,
        token: &CancellationToken,
        spec: &RuntimeWorkflow,
        step: &RuntimeStep,
        writer: Arc<dyn StreamWriter>,
    ) -> Result<Option<StepState>, HookError>;
}
