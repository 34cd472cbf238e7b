// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage contract consumed by every daemon component.
//!
//! The daemon assumes transactional, strongly consistent persistence; the
//! multi-row operations (`build_create`, `build_cancel_pending`,
//! `stage_end_update`) must be atomic. [`MemoryStore`] is the in-tree
//! implementation; a relational implementation plugs in behind the same
//! trait.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use ink_core::{BoxDef, Build, Error, Pagination, Secret, Stage, Step, Workflow};

pub type Result<T> = std::result::Result<T, Error>;

#[async_trait]
pub trait Store: Send + Sync {
    // ── resources ──────────────────────────────────────────────────────

    /// List secrets; a blank namespace means all namespaces.
    async fn secret_list(&self, namespace: &str) -> Result<Vec<Secret>>;
    async fn secret_info(&self, namespace: &str, name: &str) -> Result<Secret>;
    /// Insert, assigning `meta.id` and `meta.creation`.
    async fn secret_create(&self, data: &mut Secret) -> Result<()>;
    async fn secret_update(&self, data: &Secret) -> Result<()>;
    async fn secret_delete(&self, namespace: &str, name: &str) -> Result<()>;

    async fn workflow_list(&self, namespace: &str) -> Result<Vec<Workflow>>;
    async fn workflow_info(&self, namespace: &str, name: &str) -> Result<Workflow>;
    async fn workflow_create(&self, data: &mut Workflow) -> Result<()>;
    async fn workflow_update(&self, data: &Workflow) -> Result<()>;
    async fn workflow_delete(&self, namespace: &str, name: &str) -> Result<()>;

    async fn box_list(&self, namespace: &str) -> Result<Vec<BoxDef>>;
    async fn box_info(&self, namespace: &str, name: &str) -> Result<BoxDef>;
    async fn box_get(&self, id: u64) -> Result<BoxDef>;
    async fn box_create(&self, data: &mut BoxDef) -> Result<()>;
    async fn box_update(&self, data: &BoxDef) -> Result<()>;
    async fn box_delete(&self, namespace: &str, name: &str) -> Result<()>;

    // ── runtime entities ───────────────────────────────────────────────

    /// Atomically insert a build plus its stages and their steps.
    ///
    /// Assigns `build.number` (builds-per-box count + 1), every id, and
    /// the back-references on stages and steps.
    async fn build_create(&self, build: &mut Build, stages: &mut [Stage]) -> Result<()>;
    /// List builds of a box, newest number first. Sets `page.total`.
    async fn build_list(&self, box_id: u64, page: &mut Pagination) -> Result<Vec<Build>>;
    async fn build_info(&self, box_id: u64, number: u64) -> Result<Build>;
    async fn build_get(&self, id: u64) -> Result<Build>;
    async fn build_update(&self, build: &Build) -> Result<()>;
    /// Atomically mark every pending stage of the build, and the pending
    /// steps of those stages, as canceled.
    async fn build_cancel_pending(&self, build_id: u64, now: u64) -> Result<()>;

    async fn stage_get(&self, id: u64) -> Result<Stage>;
    async fn stage_list(&self, build_id: u64) -> Result<Vec<Stage>>;
    /// The queue feed: every stage currently in phase `Pending`.
    async fn stage_list_pending(&self) -> Result<Vec<Stage>>;
    async fn stage_update(&self, stage: &Stage) -> Result<()>;
    /// Atomically update a stage and its steps (the StageEnd write).
    async fn stage_end_update(&self, stage: &Stage, steps: &[Step]) -> Result<()>;

    async fn step_get(&self, id: u64) -> Result<Step>;
    async fn step_list(&self, stage_id: u64) -> Result<Vec<Step>>;
    async fn step_update(&self, step: &Step) -> Result<()>;

    /// Persist the serialized log of a step. First write wins.
    async fn log_create(&self, step_id: u64, data: Vec<u8>) -> Result<()>;
    async fn log_info(&self, step_id: u64) -> Result<Vec<u8>>;
}
