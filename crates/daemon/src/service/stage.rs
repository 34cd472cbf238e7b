// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing stage and step callbacks, downstream dependency
//! propagation, and build closure.

use std::collections::HashMap;

use ink_core::{truncate_error, Data, Error, Phase, Stage, Step, KIND_SECRET};
use ink_livelog::{Line, LivelogError};
use tracing::debug;

use super::Services;

/// Claim a stage for a worker. The claim is single-writer: a stage
/// already claimed by another worker rejects reassignment.
pub async fn accept(services: &Services, stage_id: u64, worker_name: &str) -> Result<(), Error> {
    let mut stage = services.store.stage_get(stage_id).await?;
    if !stage.worker_name.is_empty() && stage.worker_name != worker_name {
        return Err(Error::invalid("stage already assigned. abort"));
    }
    stage.worker_name = worker_name.to_string();
    stage.phase = Phase::Pending;
    services.store.stage_update(&stage).await
}

/// Assemble the full payload a worker needs to run a claimed stage:
/// workflow, stage status with steps, build (with sibling stages), box,
/// and the secrets the box selects under the build settings.
pub async fn info(services: &Services, stage_id: u64) -> Result<Data, Error> {
    let store = &services.store;

    let mut status = store.stage_get(stage_id).await?;
    status.steps = store.step_list(stage_id).await?;

    let mut build = store.build_get(status.build_id).await?;
    build.stages = store.stage_list(build.id).await?;

    let box_def = store.box_get(build.box_id).await?;
    let workflow = store.workflow_info(box_def.meta.namespace(), &status.name).await?;

    let secrets = select_secrets(services, &box_def, &build.settings).await?;

    Ok(Data {
        box_def: Some(box_def),
        build: Some(build),
        workflow: Some(workflow),
        status: Some(status),
        secrets,
    })
}

async fn select_secrets(
    services: &Services,
    box_def: &ink_core::BoxDef,
    settings: &HashMap<String, String>,
) -> Result<Vec<ink_core::Secret>, Error> {
    let (names, selectors) = box_def.selectors(KIND_SECRET, settings);
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let wildcard = names.iter().any(String::is_empty);

    let all = services.store.secret_list(box_def.meta.namespace()).await?;
    Ok(all
        .into_iter()
        .filter(|secret| {
            (wildcard || names.contains(&secret.meta.name))
                && (selectors.is_empty()
                    || selectors.iter().any(|s| s.matches(&secret.meta.labels)))
        })
        .collect())
}

/// Record a stage transitioning to `Running`; the first stage to begin
/// also moves the build to `Running`.
pub async fn begin(services: &Services, mut stage: Stage) -> Result<(), Error> {
    if stage.phase != Phase::Pending && stage.phase != Phase::Running {
        return Err(Error::invalid("the stage has already begun"));
    }
    let mut build = services.store.build_get(stage.build_id).await?;

    stage.error = truncate_error(&stage.error);
    services.store.stage_update(&stage).await?;

    if build.phase == Phase::Pending {
        build.phase = Phase::Running;
        build.started = services.now();
        services.store.build_update(&build).await?;
    }
    Ok(())
}

/// Record a finished stage: persist it and its steps, tear down leftover
/// live log streams, then resolve downstream effects on the build.
pub async fn end(services: &Services, mut stage: Stage) -> Result<(), Error> {
    if stage.phase == Phase::Pending {
        return Err(Error::invalid("the stage has not yet begun"));
    }

    stage.error = truncate_error(&stage.error);
    let mut steps = std::mem::take(&mut stage.steps);
    for step in &mut steps {
        step.error = truncate_error(&step.error);
    }
    services.store.stage_end_update(&stage, &steps).await?;

    for step in &steps {
        persist_step_log(services, step.id).await?;
    }

    finish_downstream(services, stage.build_id).await
}

/// Record a step transitioning to `Running` and open its live log stream.
pub async fn step_begin(services: &Services, mut step: Step) -> Result<Step, Error> {
    if step.phase != Phase::Pending && step.phase != Phase::Running {
        return Err(Error::invalid("the step has already begun"));
    }
    services
        .livelog
        .create(step.id)
        .map_err(|e| Error::internal(e.to_string()))?;

    step.error = truncate_error(&step.error);
    services.store.step_update(&step).await?;
    Ok(step)
}

/// Record a finished step: persist its status and its buffered log lines
/// as one row, then delete the live stream.
pub async fn step_end(services: &Services, mut step: Step) -> Result<Step, Error> {
    if step.phase == Phase::Pending {
        return Err(Error::invalid("the step has not yet begun"));
    }
    step.error = truncate_error(&step.error);
    services.store.step_update(&step).await?;

    persist_step_log(services, step.id).await?;
    Ok(step)
}

/// Serialize any buffered lines of the step into a log row (first write
/// wins), then delete the live stream so watchers see end-of-stream.
async fn persist_step_log(services: &Services, step_id: u64) -> Result<(), Error> {
    let lines = match services.livelog.list(step_id) {
        Ok(lines) => lines,
        Err(LivelogError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(Error::internal(e.to_string())),
    };
    if !lines.is_empty() {
        let data = serde_json::to_vec(&lines).map_err(|e| Error::internal(e.to_string()))?;
        match services.store.log_create(step_id, data).await {
            Ok(()) | Err(Error::AlreadyExists) => {}
            Err(e) => return Err(e),
        }
    }
    services.livelog.delete(step_id).map_err(|e| Error::internal(e.to_string()))
}

/// Ingest a batch of uploaded log lines.
///
/// `all = true` marks the batch as the full authoritative log: when the
/// live line count already matches it is a no-op, otherwise the stream is
/// reset and replayed without re-publishing to watchers.
pub async fn log_upload(
    services: &Services,
    step_id: u64,
    lines: Vec<Line>,
    all: bool,
) -> Result<(), Error> {
    if lines.is_empty() {
        return Err(Error::invalid("empty log line"));
    }

    let mut publish = true;
    if all {
        if services.livelog.line_count(step_id) == lines.len() {
            return Ok(());
        }
        services.livelog.reset(step_id).map_err(|e| Error::internal(e.to_string()))?;
        publish = false;
    }
    for line in lines {
        services
            .livelog
            .write(step_id, line, publish)
            .map_err(|e| Error::internal(e.to_string()))?;
    }
    Ok(())
}

/// Resolve downstream effects after any stage reaches a terminal phase
/// (or a build mutates without one): skip waiting stages whose outcome is
/// already decided, promote waiting stages whose dependencies completed
/// successfully, and close the build once every stage is done.
pub async fn finish_downstream(services: &Services, build_id: u64) -> Result<(), Error> {
    let mut build = services.store.build_get(build_id).await?;
    let mut stages = services.store.stage_list(build_id).await?;
    let now = services.now();

    let mut promoted = false;
    // propagate to a fixpoint: skipping one stage can decide its
    // dependents in the same pass
    loop {
        let mut changed = false;
        let failed = stages.iter().any(|s| s.phase.is_failed());

        for i in 0..stages.len() {
            if stages[i].phase != Phase::Waiting || !deps_done(&stages[i], &stages) {
                continue;
            }
            if failed || !deps_succeeded(&stages[i], &stages) {
                skip_stage(services, &mut stages[i], now).await?;
                changed = true;
            }
        }

        for i in 0..stages.len() {
            let stage = &stages[i];
            if stage.phase != Phase::Waiting
                || stage.depends_on.is_empty()
                || !deps_done(stage, &stages)
            {
                continue;
            }
            stages[i].phase = Phase::Pending;
            services.store.stage_update(&stages[i]).await?;
            changed = true;
            promoted = true;
        }

        if !changed {
            break;
        }
    }

    if promoted {
        services.sched.schedule();
    }

    // build closure: done iff every stage is done; failed wins over
    // canceled, scanning in stage order
    if !build.phase.is_done() && stages.iter().all(|s| s.phase.is_done()) {
        build.phase = Phase::Succeeded;
        for stage in &stages {
            if stage.phase == Phase::Failed || stage.phase == Phase::Canceled {
                build.phase = stage.phase;
                break;
            }
        }
        build.stopped = now;
        if build.started == 0 {
            build.started = build.stopped;
        }
        services.store.build_update(&build).await?;
        debug!(build_id, phase = %build.phase, "build closed");
    }
    Ok(())
}

async fn skip_stage(services: &Services, stage: &mut Stage, now: u64) -> Result<(), Error> {
    stage.phase = Phase::Skipped;
    stage.started = now;
    stage.stopped = now;
    services.store.stage_update(stage).await?;

    // steps of a skipped stage adopt the stage timestamps
    let mut steps = services.store.step_list(stage.id).await?;
    for step in &mut steps {
        if step.phase.is_done() {
            continue;
        }
        step.phase = Phase::Skipped;
        step.started = now;
        step.stopped = now;
        services.store.step_update(step).await?;
    }
    Ok(())
}

/// All dependencies present in the build are done. Names that resolve to
/// no stage are ignored.
fn deps_done(stage: &Stage, stages: &[Stage]) -> bool {
    stages
        .iter()
        .filter(|s| stage.depends_on.iter().any(|d| d == &s.name))
        .all(|s| s.phase.is_done())
}

fn deps_succeeded(stage: &Stage, stages: &[Stage]) -> bool {
    stages
        .iter()
        .filter(|s| stage.depends_on.iter().any(|d| d == &s.name))
        .all(|s| s.phase.is_succeeded())
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
