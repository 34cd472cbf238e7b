// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-stage queue: holds idle worker subscriptions and dispatches
//! compatible stages to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::warn;

use ink_core::{Phase, Stage, WorkerDescriptor, WorkerKind};

/// Loads the dispatchable stages, newest state, on every tick.
pub type StoreFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<Stage>, ink_core::Error>> + Send + Sync>;

const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct Queue {
    inner: Mutex<Inner>,
    ready: Notify,
    store_fn: StoreFn,
}

#[derive(Default)]
struct Inner {
    paused: bool,
    next_id: u64,
    subs: HashMap<u64, Subscription>,
}

struct Subscription {
    kind: WorkerKind,
    labels: HashMap<String, String>,
    os: String,
    arch: String,
    tx: oneshot::Sender<Stage>,
}

impl Subscription {
    fn matches(&self, item: &Stage) -> bool {
        if self.kind != item.worker.kind {
            return false;
        }
        // a platform-specific worker only takes stages on its platform
        if !self.os.is_empty() || !self.arch.is_empty() {
            if let Some(platform) = &item.worker.platform {
                if self.os != platform.os || self.arch != platform.arch {
                    return false;
                }
            }
        }
        self.labels == item.worker.labels
    }
}

impl Queue {
    /// Create the queue and spawn its dispatch loop. Must be called from
    /// within a tokio runtime.
    pub fn start(store_fn: StoreFn) -> Arc<Self> {
        let queue = Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            ready: Notify::new(),
            store_fn,
        });
        let ticker = Arc::clone(&queue);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.ready.notified() => {}
                    _ = tokio::time::sleep(TICK_INTERVAL) => {}
                }
                if let Err(e) = ticker.signal().await {
                    warn!(error = %e, "queue dispatch tick failed");
                }
            }
        });
        queue
    }

    pub fn schedule(&self) {
        self.ready.notify_one();
    }

    pub fn pause(&self) {
        self.inner.lock().paused = true;
    }

    pub fn resume(&self) {
        self.inner.lock().paused = false;
        self.ready.notify_one();
    }

    pub fn paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Register a worker subscription and wait for a dispatched stage.
    ///
    /// Dropping the returned future (request timeout, disconnect) removes
    /// the subscription.
    pub async fn request(&self, worker: WorkerDescriptor) -> Result<Stage, ink_core::Error> {
        let (tx, rx) = oneshot::channel();
        let sub = Subscription {
            kind: worker.kind,
            labels: worker.labels,
            os: worker.platform.as_ref().map(|p| p.os.clone()).unwrap_or_default(),
            arch: worker.platform.as_ref().map(|p| p.arch.clone()).unwrap_or_default(),
            tx,
        };
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subs.insert(id, sub);
            id
        };
        let _guard = SubscriptionGuard { queue: self, id };
        self.ready.notify_one();

        rx.await.map_err(|_| ink_core::Error::Canceled)
    }

    /// One dispatch pass: fetch dispatchable stages and hand each to the
    /// first compatible idle subscription.
    async fn signal(&self) -> Result<(), ink_core::Error> {
        {
            let inner = self.inner.lock();
            if inner.paused || inner.subs.is_empty() {
                return Ok(());
            }
        }

        let items = (self.store_fn)().await?;
        if items.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        for item in &items {
            if item.phase == Phase::Running {
                continue;
            }
            if !within_limits(item, &items) {
                continue;
            }
            if should_throttle(item, &items, item.limit) {
                continue;
            }

            let candidates: Vec<u64> = inner
                .subs
                .iter()
                .filter(|(_, sub)| sub.matches(item))
                .map(|(id, _)| *id)
                .collect();
            for id in candidates {
                if let Some(sub) = inner.subs.remove(&id) {
                    // a receiver gone mid-dispatch leaves the stage for
                    // the next tick
                    if sub.tx.send(item.clone()).is_ok() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

struct SubscriptionGuard<'a> {
    queue: &'a Queue,
    id: u64,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.queue.inner.lock().subs.remove(&self.id);
    }
}

/// Per-(box, workflow) concurrency gate: siblings with the same name that
/// are running, or queued ahead of this stage, consume the limit.
fn within_limits(stage: &Stage, siblings: &[Stage]) -> bool {
    if stage.limit == 0 {
        return true;
    }
    let mut count = 0u32;
    for sibling in siblings {
        if sibling.box_id != stage.box_id
            || sibling.id == stage.id
            || sibling.name != stage.name
        {
            continue;
        }
        if sibling.id < stage.id || sibling.phase == Phase::Running {
            count += 1;
        }
    }
    count < stage.limit
}

/// Box-wide throttle gate: stages of the same box queued ahead of this
/// stage consume the throttle count.
fn should_throttle(stage: &Stage, siblings: &[Stage], limit: u32) -> bool {
    if limit == 0 {
        return false;
    }
    // a running stage is already past the gate
    if stage.phase == Phase::Running {
        return false;
    }
    let count = siblings
        .iter()
        .filter(|sibling| sibling.box_id == stage.box_id && sibling.id < stage.id)
        .count() as u32;
    count >= limit
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
