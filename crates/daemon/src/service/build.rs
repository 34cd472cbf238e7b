// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build orchestration: materializing builds from boxes, listing them,
//! and client-side cancellation.

use std::collections::HashMap;

use ink_core::{Build, Error, Pagination, Phase, Stage, Step};

use super::resource::selected_workflows;
use super::stage::finish_downstream;
use super::{normalize_namespace, Services};

/// Materialize a build: resolve the box's workflow selectors against the
/// settings and insert the build, stage and step rows in one transaction.
///
/// A stage starts `Skipped` when its workflow's `when` rejects the
/// settings, `Waiting` when it has dependencies, `Pending` otherwise.
/// Returns the 1-based build number.
pub async fn create(
    services: &Services,
    namespace: &str,
    name: &str,
    settings: HashMap<String, String>,
) -> Result<u64, Error> {
    let namespace = normalize_namespace(namespace);
    let box_def = services.store.box_info(namespace, name).await?;

    let (names, _) = box_def.selectors(ink_core::KIND_WORKFLOW, &settings);
    if names.is_empty() {
        return Err(Error::invalid("workflow resource not found"));
    }
    let workflows = selected_workflows(services, &box_def, &settings).await?;
    if workflows.is_empty() {
        return Err(Error::invalid("no workflow matched"));
    }

    let mut build = Build {
        box_id: box_def.meta.id,
        phase: Phase::Pending,
        settings: settings.clone(),
        ..Default::default()
    };

    let mut stages = Vec::with_capacity(workflows.len());
    for (k, workflow) in workflows.iter().enumerate() {
        let phase = if !ink_core::selector::matches_opt(workflow.spec.when.as_ref(), &settings) {
            Phase::Skipped
        } else if !workflow.spec.depends_on.is_empty() {
            Phase::Waiting
        } else {
            Phase::Pending
        };

        let steps = workflow
            .spec
            .steps
            .iter()
            .enumerate()
            .map(|(sk, step)| Step {
                number: sk as u64 + 1,
                phase,
                name: step.name.clone(),
                ..Default::default()
            })
            .collect();

        stages.push(Stage {
            number: k as u64 + 1,
            phase,
            name: workflow.meta.name.clone(),
            limit: workflow.spec.concurrency,
            worker: workflow.worker(),
            depends_on: workflow.spec.depends_on.clone(),
            steps,
            ..Default::default()
        });
    }

    services.store.build_create(&mut build, &mut stages).await?;

    // a stage can be born Skipped; resolve its dependents right away so
    // the build cannot strand without a future StageEnd callback
    if stages.iter().any(|s| s.phase == Phase::Skipped) {
        finish_downstream(services, build.id).await?;
    }

    services.sched.schedule();
    Ok(build.number)
}

/// List builds of a box, newest first.
pub async fn list(
    services: &Services,
    namespace: &str,
    name: &str,
    page: &mut Pagination,
) -> Result<Vec<Build>, Error> {
    let namespace = normalize_namespace(namespace);
    let box_def = services.store.box_info(namespace, name).await?;
    services.store.build_list(box_def.meta.id, page).await
}

/// Full build, stages and steps included.
pub async fn info(
    services: &Services,
    namespace: &str,
    name: &str,
    number: u64,
) -> Result<Build, Error> {
    let namespace = normalize_namespace(namespace);
    let box_def = services.store.box_info(namespace, name).await?;
    let mut build = services.store.build_info(box_def.meta.id, number).await?;

    let mut stages = services.store.stage_list(build.id).await?;
    for stage in &mut stages {
        stage.steps = services.store.step_list(stage.id).await?;
    }
    build.stages = stages;
    Ok(build)
}

/// Cancel a build: pending stages and their pending steps flip to
/// `Canceled` transactionally, watchers are woken, and waiting stages are
/// resolved so the build reaches a terminal phase.
pub async fn cancel(
    services: &Services,
    namespace: &str,
    name: &str,
    number: u64,
) -> Result<(), Error> {
    let namespace = normalize_namespace(namespace);
    let box_def = services.store.box_info(namespace, name).await?;
    let build = services.store.build_info(box_def.meta.id, number).await?;
    if build.phase.is_done() {
        return Err(Error::AlreadyDone);
    }

    services.store.build_cancel_pending(build.id, services.now()).await?;
    finish_downstream(services, build.id).await?;

    services.sched.cancel(build.id);
    Ok(())
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
