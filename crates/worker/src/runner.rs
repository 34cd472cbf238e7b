// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker loop: long-poll, claim, execute, finalize.
//!
//! An outer controller multiplies the loop over `count` slots, each with
//! its own client session, backing off exponentially (capped at 60s) on
//! failure and resetting on success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use ink_core::{selector::matches_opt, truncate_error, Phase, Secret, Stage, Workflow};
use ink_livelog::{LineBatch, LogWriter, StreamWriter};

use crate::client::{Client, ClientError, ClientV1};
use crate::hook::{Hook, HookError};
use crate::mask::MaskWriter;
use crate::spec::RuntimeWorkflow;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The build was canceled while the stage ran.
    #[error("canceled")]
    Canceled,

    #[error("stage data not found")]
    MissingData,

    #[error("convert to runtime workflow failed: {0}")]
    Convert(ink_core::Error),
}

pub struct Runner {
    client: Arc<dyn Client>,
    hook: Arc<dyn Hook>,
    count: usize,
}

impl Runner {
    pub fn new(client: Arc<dyn Client>, hook: Arc<dyn Hook>, count: usize) -> Self {
        Self { client, hook, count: count.max(1) }
    }

    /// Run `count` worker slots until the token cancels.
    pub async fn run(&self, token: CancellationToken) {
        let mut slots = JoinSet::new();
        for _ in 0..self.count {
            let client = self.client.v1();
            let hook = Arc::clone(&self.hook);
            let token = token.clone();
            slots.spawn(async move { run_loop(token, client, hook).await });
        }
        while slots.join_next().await.is_some() {}
    }
}

async fn run_loop(token: CancellationToken, client: Arc<dyn ClientV1>, hook: Arc<dyn Hook>) {
    let mut wait_times: u32 = 0;
    loop {
        if token.is_cancelled() {
            return;
        }
        match run_once(&token, Arc::clone(&client), hook.as_ref()).await {
            Ok(()) => {
                wait_times = 0;
                debug!(client = client.name(), "worker iteration complete");
            }
            Err(e) => {
                error!(client = client.name(), error = %e, wait = wait_times, "worker iteration failed");
                let backoff =
                    Duration::from_secs(2u64.saturating_pow(wait_times)).min(MAX_BACKOFF);
                wait_times += 1;
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = token.cancelled() => return,
                }
            }
        }
    }
}

/// One worker iteration: request → accept → info → execute with a
/// concurrent cancel watch → finalize.
pub async fn run_once(
    token: &CancellationToken,
    client: Arc<dyn ClientV1>,
    hook: &dyn Hook,
) -> Result<(), RunError> {
    let stage = client.request().await?;
    debug!(stage_id = stage.id, stage_name = %stage.name, "stage dispatched");

    match client.accept(stage.id).await {
        Ok(()) => {}
        // claimed by another worker first: quietly abort this iteration
        Err(e) if e.is_claim_conflict() => {
            debug!(stage_id = stage.id, "stage already assigned, abort");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let data = client.info(stage.id).await?;
    let workflow = data.workflow.ok_or(RunError::MissingData)?;
    let mut status = data.status.ok_or(RunError::MissingData)?;
    let settings = data
        .build
        .as_ref()
        .map(|b| b.complete_settings(data.box_def.as_ref()))
        .unwrap_or_default();
    let build_id = status.build_id;

    // cancel watch: flips the child token when the daemon broadcasts
    let cancel_token = token.child_token();
    let watcher = {
        let client = Arc::clone(&client);
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                result = client.watch_cancel(build_id) => match result {
                    Ok(()) => cancel_token.cancel(),
                    Err(e) => warn!(build_id, error = %e, "cancel watch ended"),
                }
            }
        })
    };

    let result = execute(
        &cancel_token,
        &client,
        hook,
        &workflow,
        &mut status,
        data.secrets,
        settings,
    )
    .await;
    cancel_token.cancel();
    let _ = watcher.await;

    match result {
        Ok(()) => Ok(()),
        Err(RunError::Canceled) => finalize_cancel(client.as_ref(), &mut status).await,
        Err(e) => Err(e),
    }
}

/// The stage execution state machine.
#[allow(clippy::too_many_arguments)]
async fn execute(
    token: &CancellationToken,
    client: &Arc<dyn ClientV1>,
    hook: &dyn Hook,
    workflow: &Workflow,
    status: &mut Stage,
    secrets: Vec<Secret>,
    settings: HashMap<String, String>,
) -> Result<(), RunError> {
    let mut spec =
        RuntimeWorkflow::convert(workflow, status, &secrets).map_err(RunError::Convert)?;

    status.started = now_secs();

    // a non-matching `when` skips the whole stage
    if !matches_opt(workflow.spec.when.as_ref(), &settings) {
        status.phase = Phase::Skipped;
        for step in &mut status.steps {
            step.phase = Phase::Skipped;
            step.started = status.started;
            step.stopped = status.started;
        }
        client.stage_end(status).await?;
        return Ok(());
    }

    // decrypt secrets and collect their values for log masking
    let mut mask_values = Vec::new();
    for mut secret in secrets {
        if let Err(e) = secret.decrypt() {
            status.phase = Phase::Failed;
            status.error = truncate_error(&e.to_string());
            for step in &mut status.steps {
                step.phase = Phase::Skipped;
                step.started = status.started;
                step.stopped = status.started;
            }
            client.stage_end(status).await?;
            return Ok(());
        }
        mask_values.extend(secret.data.values().cloned());
    }

    let mut failed = false;
    let mut canceled = false;

    status.phase = Phase::Running;
    client.stage_begin(status).await?;

    debug!(stage = %spec.id, "stage begin hook");
    if let Err(e) = hook.begin(&mut spec).await {
        failed = true;
        status.error = truncate_error(&e.to_string());
        error!(stage = %spec.id, error = %e, "stage begin hook failed");
    }

    for i in 0..status.steps.len() {
        spec.combine_step_env(&status.steps[i].name, &settings);
        let step = &mut status.steps[i];
        step.started = now_secs();

        let step_spec = spec.step(&step.name).cloned();
        if step_spec.is_none() || failed {
            step.phase = Phase::Skipped;
            step.stopped = step.started;
            client.step_end(step).await?;
            continue;
        }
        if canceled {
            step.phase = Phase::Canceled;
            step.stopped = step.started;
            client.step_end(step).await?;
            continue;
        }
        let step_spec = step_spec.unwrap_or_default();

        step.phase = Phase::Running;
        client.step_begin(step).await?;

        // debounced writer → secret mask → upload task
        let (batch_tx, batch_rx) = mpsc::unbounded_channel::<LineBatch>();
        let writer = LogWriter::spawn(batch_tx);
        let masked = MaskWriter::wrap(writer, &mask_values);
        let uploader = tokio::spawn(upload_logs(Arc::clone(client), step.id, batch_rx));

        debug!(step = %step.name, "step hook");
        let result = hook.step(token, &spec, &step_spec, Arc::clone(&masked)).await;
        masked.close();
        // dropping the writer chain closes the batch channel once the
        // flusher notices the close, letting the uploader drain and exit
        drop(masked);
        let _ = uploader.await;

        step.stopped = now_secs();
        step.phase = Phase::Succeeded;
        match result {
            Err(HookError::Canceled) => {
                step.phase = Phase::Canceled;
                canceled = true;
                debug!(step = %step.name, "step hook canceled");
            }
            Err(e) => {
                step.phase = Phase::Failed;
                step.error = truncate_error(&e.to_string());
                failed = true;
                error!(step = %step.name, error = %e, "step hook failed");
            }
            Ok(state) => {
                if let Some(mut state) = state {
                    if state.oom_killed {
                        debug!(step = %step.name, "received oom kill");
                        state.exit_code = 137;
                    } else {
                        debug!(step = %step.name, exit_code = state.exit_code, "received exit code");
                    }
                    step.exit_code = state.exit_code;
                    // exit code 78 skips all subsequent steps
                    if state.exit_code == 78 {
                        debug!(step = %step.name, "received exit code 78, early exit");
                        step.phase = Phase::Skipped;
                        failed = true;
                    } else if state.exit_code > 0 {
                        step.phase = Phase::Failed;
                        failed = true;
                    }
                }
            }
        }

        client.step_end(step).await?;
    }

    debug!(stage = %spec.id, "stage end hook");
    if let Err(e) = hook.end(&spec).await {
        error!(stage = %spec.id, error = %e, "stage end hook failed");
    }

    if canceled {
        return Err(RunError::Canceled);
    }

    status.stopped = now_secs();
    status.phase = if failed { Phase::Failed } else { Phase::Succeeded };
    client.stage_end(status).await?;
    Ok(())
}

/// Mark every unfinished step and the stage itself canceled.
async fn finalize_cancel(client: &dyn ClientV1, status: &mut Stage) -> Result<(), RunError> {
    if status.phase.is_done() {
        return Ok(());
    }
    let now = now_secs();
    for step in &mut status.steps {
        if step.phase.is_done() {
            continue;
        }
        step.phase = Phase::Canceled;
        step.stopped = now;
        if step.started == 0 {
            step.started = now;
        }
        client.step_end(step).await?;
    }

    status.phase = Phase::Canceled;
    status.stopped = now;
    if status.started == 0 {
        status.started = now;
    }
    client.stage_end(status).await?;
    Ok(())
}

/// Ship batches from the log writer until the authoritative close-out
/// batch (or channel close).
async fn upload_logs(
    client: Arc<dyn ClientV1>,
    step_id: u64,
    mut batches: mpsc::UnboundedReceiver<LineBatch>,
) {
    while let Some((lines, all)) = batches.recv().await {
        if lines.is_empty() {
            continue;
        }
        if let Err(e) = client.log_upload(step_id, &lines, all).await {
            warn!(step_id, error = %e, "log upload failed");
        }
        if all {
            break;
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
