// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage scheduling: the pending-stage queue and the cancellation
//! broadcast subsystem, behind one facade.

mod canceller;
mod queue;

pub use queue::{Queue, StoreFn};

use std::sync::Arc;

use ink_core::{Stage, WorkerDescriptor};

use canceller::Canceller;

/// Schedules build stages for execution and broadcasts cancellations.
pub struct Scheduler {
    queue: Arc<Queue>,
    canceller: Canceller,
}

impl Scheduler {
    pub fn new(store_fn: StoreFn) -> Arc<Self> {
        Arc::new(Self { queue: Queue::start(store_fn), canceller: Canceller::new() })
    }

    /// Non-blocking dispatch signal; multiple signals coalesce.
    pub fn schedule(&self) {
        self.queue.schedule();
    }

    /// Block until a matching stage is dispatched to this worker.
    pub async fn request(&self, worker: WorkerDescriptor) -> Result<Stage, ink_core::Error> {
        self.queue.request(worker).await
    }

    pub fn pause(&self) {
        self.queue.pause();
    }

    pub fn resume(&self) {
        self.queue.resume();
    }

    pub fn paused(&self) -> bool {
        self.queue.paused()
    }

    /// Record a cancellation and wake every watcher of the build.
    pub fn cancel(&self, build_id: u64) {
        self.canceller.cancel(build_id);
    }

    /// Block until the build is canceled. The caller bounds the wait.
    pub async fn canceled(&self, build_id: u64) -> bool {
        self.canceller.canceled(build_id).await
    }
}
