// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store. One lock over all tables makes the multi-row
//! operations trivially atomic; ids come from a single monotonic counter
//! so stage id order is creation order.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use ink_core::{
    BoxDef, Build, Error, Metadata, Pagination, Phase, Secret, Stage, Step, Workflow,
};

use super::{Result, Store};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    seq: u64,
    secrets: Vec<Secret>,
    workflows: Vec<Workflow>,
    boxes: Vec<BoxDef>,
    builds: Vec<Build>,
    stages: Vec<Stage>,
    steps: Vec<Step>,
    logs: HashMap<u64, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

fn same_object(meta: &Metadata, namespace: &str, name: &str) -> bool {
    meta.namespace() == namespace && meta.name == name
}

fn in_namespace(meta: &Metadata, namespace: &str) -> bool {
    namespace.is_empty() || meta.namespace() == namespace
}

/// Sync CRUD helpers over one resource table; the three resource kinds
/// share the shape and differ only in the table they touch.
macro_rules! resource_table {
    ($list:ident, $info:ident, $create:ident, $update:ident, $delete:ident, $table:ident, $ty:ty) => {
        fn $list(&self, namespace: &str) -> Result<Vec<$ty>> {
            let tables = self.tables.lock();
            Ok(tables
                .$table
                .iter()
                .filter(|v| in_namespace(&v.meta, namespace))
                .cloned()
                .collect())
        }

        fn $info(&self, namespace: &str, name: &str) -> Result<$ty> {
            let tables = self.tables.lock();
            tables
                .$table
                .iter()
                .find(|v| same_object(&v.meta, namespace, name))
                .cloned()
                .ok_or(Error::NoRecord)
        }

        fn $create(&self, data: &mut $ty) -> Result<()> {
            let mut tables = self.tables.lock();
            if tables
                .$table
                .iter()
                .any(|v| same_object(&v.meta, data.meta.namespace(), &data.meta.name))
            {
                return Err(Error::AlreadyExists);
            }
            data.meta.id = tables.next_id();
            tables.$table.push(data.clone());
            Ok(())
        }

        fn $update(&self, data: &$ty) -> Result<()> {
            let mut tables = self.tables.lock();
            let slot = tables
                .$table
                .iter_mut()
                .find(|v| same_object(&v.meta, data.meta.namespace(), &data.meta.name))
                .ok_or(Error::NoRecord)?;
            let mut updated = data.clone();
            updated.meta.id = slot.meta.id;
            updated.meta.creation = slot.meta.creation;
            *slot = updated;
            Ok(())
        }

        fn $delete(&self, namespace: &str, name: &str) -> Result<()> {
            let mut tables = self.tables.lock();
            let before = tables.$table.len();
            tables.$table.retain(|v| !same_object(&v.meta, namespace, name));
            if tables.$table.len() == before {
                return Err(Error::NoRecord);
            }
            Ok(())
        }
    };
}

impl MemoryStore {
    resource_table!(
        secrets_list,
        secrets_info,
        secrets_create,
        secrets_update,
        secrets_delete,
        secrets,
        Secret
    );

    resource_table!(
        workflows_list,
        workflows_info,
        workflows_create,
        workflows_update,
        workflows_delete,
        workflows,
        Workflow
    );

    resource_table!(
        boxes_list,
        boxes_info,
        boxes_create,
        boxes_update,
        boxes_delete,
        boxes,
        BoxDef
    );
}

#[async_trait]
impl Store for MemoryStore {
    async fn secret_list(&self, namespace: &str) -> Result<Vec<Secret>> {
        self.secrets_list(namespace)
    }

    async fn secret_info(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets_info(namespace, name)
    }

    async fn secret_create(&self, data: &mut Secret) -> Result<()> {
        self.secrets_create(data)
    }

    async fn secret_update(&self, data: &Secret) -> Result<()> {
        self.secrets_update(data)
    }

    async fn secret_delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.secrets_delete(namespace, name)
    }

    async fn workflow_list(&self, namespace: &str) -> Result<Vec<Workflow>> {
        self.workflows_list(namespace)
    }

    async fn workflow_info(&self, namespace: &str, name: &str) -> Result<Workflow> {
        self.workflows_info(namespace, name)
    }

    async fn workflow_create(&self, data: &mut Workflow) -> Result<()> {
        self.workflows_create(data)
    }

    async fn workflow_update(&self, data: &Workflow) -> Result<()> {
        self.workflows_update(data)
    }

    async fn workflow_delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.workflows_delete(namespace, name)
    }

    async fn box_list(&self, namespace: &str) -> Result<Vec<BoxDef>> {
        self.boxes_list(namespace)
    }

    async fn box_info(&self, namespace: &str, name: &str) -> Result<BoxDef> {
        self.boxes_info(namespace, name)
    }

    async fn box_get(&self, id: u64) -> Result<BoxDef> {
        let tables = self.tables.lock();
        tables.boxes.iter().find(|b| b.meta.id == id).cloned().ok_or(Error::NoRecord)
    }

    async fn box_create(&self, data: &mut BoxDef) -> Result<()> {
        self.boxes_create(data)
    }

    async fn box_update(&self, data: &BoxDef) -> Result<()> {
        self.boxes_update(data)
    }

    async fn box_delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.boxes_delete(namespace, name)
    }

    async fn build_create(&self, build: &mut Build, stages: &mut [Stage]) -> Result<()> {
        let mut tables = self.tables.lock();

        build.number =
            tables.builds.iter().filter(|b| b.box_id == build.box_id).count() as u64 + 1;
        build.id = tables.next_id();

        let mut stored_build = build.clone();
        stored_build.stages.clear();
        tables.builds.push(stored_build);

        for stage in stages.iter_mut() {
            stage.id = tables.next_id();
            stage.build_id = build.id;
            stage.box_id = build.box_id;
            for step in stage.steps.iter_mut() {
                step.id = tables.next_id();
                step.stage_id = stage.id;
            }

            let mut stored_stage = stage.clone();
            stored_stage.steps.clear();
            tables.stages.push(stored_stage);
            let steps = stage.steps.clone();
            tables.steps.extend(steps);
        }
        Ok(())
    }

    async fn build_list(&self, box_id: u64, page: &mut Pagination) -> Result<Vec<Build>> {
        page.complete();
        let tables = self.tables.lock();
        let mut builds: Vec<Build> =
            tables.builds.iter().filter(|b| b.box_id == box_id).cloned().collect();
        builds.sort_by(|a, b| b.number.cmp(&a.number));
        page.total = builds.len() as u64;

        let start = (page.offset() as usize).min(builds.len());
        let end = (start + page.limit() as usize).min(builds.len());
        Ok(builds[start..end].to_vec())
    }

    async fn build_info(&self, box_id: u64, number: u64) -> Result<Build> {
        let tables = self.tables.lock();
        tables
            .builds
            .iter()
            .find(|b| b.box_id == box_id && b.number == number)
            .cloned()
            .ok_or(Error::NoRecord)
    }

    async fn build_get(&self, id: u64) -> Result<Build> {
        let tables = self.tables.lock();
        tables.builds.iter().find(|b| b.id == id).cloned().ok_or(Error::NoRecord)
    }

    async fn build_update(&self, build: &Build) -> Result<()> {
        let mut tables = self.tables.lock();
        let slot =
            tables.builds.iter_mut().find(|b| b.id == build.id).ok_or(Error::NoRecord)?;
        let mut updated = build.clone();
        updated.stages.clear();
        *slot = updated;
        Ok(())
    }

    async fn build_cancel_pending(&self, build_id: u64, now: u64) -> Result<()> {
        let mut tables = self.tables.lock();
        let mut canceled_stages = Vec::new();
        for stage in tables.stages.iter_mut() {
            if stage.build_id == build_id && stage.phase == Phase::Pending {
                stage.phase = Phase::Canceled;
                stage.started = now;
                stage.stopped = now;
                canceled_stages.push(stage.id);
            }
        }
        for step in tables.steps.iter_mut() {
            if canceled_stages.contains(&step.stage_id) && step.phase == Phase::Pending {
                step.phase = Phase::Canceled;
                step.started = now;
                step.stopped = now;
            }
        }
        Ok(())
    }

    async fn stage_get(&self, id: u64) -> Result<Stage> {
        let tables = self.tables.lock();
        tables.stages.iter().find(|s| s.id == id).cloned().ok_or(Error::NoRecord)
    }

    async fn stage_list(&self, build_id: u64) -> Result<Vec<Stage>> {
        let tables = self.tables.lock();
        let mut stages: Vec<Stage> =
            tables.stages.iter().filter(|s| s.build_id == build_id).cloned().collect();
        stages.sort_by_key(|s| s.number);
        Ok(stages)
    }

    async fn stage_list_pending(&self) -> Result<Vec<Stage>> {
        let tables = self.tables.lock();
        Ok(tables.stages.iter().filter(|s| s.phase == Phase::Pending).cloned().collect())
    }

    async fn stage_update(&self, stage: &Stage) -> Result<()> {
        let mut tables = self.tables.lock();
        let slot =
            tables.stages.iter_mut().find(|s| s.id == stage.id).ok_or(Error::NoRecord)?;
        let mut updated = stage.clone();
        updated.steps.clear();
        *slot = updated;
        Ok(())
    }

    async fn stage_end_update(&self, stage: &Stage, steps: &[Step]) -> Result<()> {
        let mut tables = self.tables.lock();
        let slot =
            tables.stages.iter_mut().find(|s| s.id == stage.id).ok_or(Error::NoRecord)?;
        let mut updated = stage.clone();
        updated.steps.clear();
        *slot = updated;

        for step in steps {
            let slot = tables
                .steps
                .iter_mut()
                .find(|s| s.id == step.id)
                .ok_or(Error::NoRecord)?;
            *slot = step.clone();
        }
        Ok(())
    }

    async fn step_get(&self, id: u64) -> Result<Step> {
        let tables = self.tables.lock();
        tables.steps.iter().find(|s| s.id == id).cloned().ok_or(Error::NoRecord)
    }

    async fn step_list(&self, stage_id: u64) -> Result<Vec<Step>> {
        let tables = self.tables.lock();
        let mut steps: Vec<Step> =
            tables.steps.iter().filter(|s| s.stage_id == stage_id).cloned().collect();
        steps.sort_by_key(|s| s.number);
        Ok(steps)
    }

    async fn step_update(&self, step: &Step) -> Result<()> {
        let mut tables = self.tables.lock();
        let slot =
            tables.steps.iter_mut().find(|s| s.id == step.id).ok_or(Error::NoRecord)?;
        *slot = step.clone();
        Ok(())
    }

    async fn log_create(&self, step_id: u64, data: Vec<u8>) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.logs.contains_key(&step_id) {
            return Err(Error::AlreadyExists);
        }
        tables.logs.insert(step_id, data);
        Ok(())
    }

    async fn log_info(&self, step_id: u64) -> Result<Vec<u8>> {
        let tables = self.tables.lock();
        tables.logs.get(&step_id).cloned().ok_or(Error::NoRecord)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
