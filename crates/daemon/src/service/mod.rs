// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon services: one struct, constructed at startup, handed to every
//! handler. No process-wide globals.

pub mod build;
pub mod resource;
pub mod stage;

use std::sync::Arc;

use ink_core::{Clock, Error, Phase, SystemClock};
use ink_livelog::Livelog;

use crate::sched::{Scheduler, StoreFn};
use crate::storage::Store;

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub sched: Arc<Scheduler>,
    pub livelog: Arc<dyn Livelog>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Wire the daemon together. Must be called from within a tokio
    /// runtime (the scheduler spawns its dispatch loop).
    pub fn new(store: Arc<dyn Store>, livelog: Arc<dyn Livelog>) -> Self {
        Self::with_clock(store, livelog, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn Store>,
        livelog: Arc<dyn Livelog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sched = Scheduler::new(pending_stage_feed(Arc::clone(&store), Arc::clone(&clock)));
        Self { store, sched, livelog, clock }
    }

    pub fn now(&self) -> u64 {
        self.clock.epoch_secs()
    }
}

/// The queue's stage feed: pending stages, with stages of a deleted box
/// marked skipped instead of dispatched.
fn pending_stage_feed(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> StoreFn {
    Arc::new(move || {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        Box::pin(async move {
            let pending = store.stage_list_pending().await?;
            let mut out = Vec::with_capacity(pending.len());
            for mut stage in pending {
                if store.box_get(stage.box_id).await == Err(Error::NoRecord) {
                    let now = clock.epoch_secs();
                    stage.phase = Phase::Skipped;
                    stage.started = now;
                    stage.stopped = now;
                    store.stage_update(&stage).await?;
                    continue;
                }
                out.push(stage);
            }
            Ok(out)
        })
    })
}

/// Resolve a blank write namespace to the literal default.
pub fn normalize_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        ink_core::DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

#[cfg(test)]
pub(crate) fn test_services() -> Services {
    use crate::storage::MemoryStore;
    use ink_core::FakeClock;
    use ink_livelog::MemoryLivelog;

    Services::with_clock(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryLivelog::new()),
        Arc::new(FakeClock::new()),
    )
}

#[cfg(test)]
mod feed_tests {
    use super::*;
    use ink_core::{BoxDef, Build, Metadata, Stage};

    #[tokio::test]
    async fn feed_skips_stages_of_deleted_boxes() {
        let services = test_services();
        let store = &services.store;

        let mut surviving_box =
            BoxDef { meta: Metadata::new("default", "alive"), ..Default::default() };
        store.box_create(&mut surviving_box).await.unwrap();

        let mut build = Build { box_id: surviving_box.meta.id, ..Default::default() };
        let mut stages = vec![Stage { number: 1, phase: Phase::Pending, ..Default::default() }];
        store.build_create(&mut build, &mut stages).await.unwrap();

        let mut orphan_build = Build { box_id: 9999, ..Default::default() };
        let mut orphan_stages =
            vec![Stage { number: 1, phase: Phase::Pending, ..Default::default() }];
        store.build_create(&mut orphan_build, &mut orphan_stages).await.unwrap();

        let feed = pending_stage_feed(Arc::clone(store), Arc::clone(&services.clock));
        let items = feed().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].build_id, build.id);

        let orphan = store.stage_list(orphan_build.id).await.unwrap();
        assert_eq!(orphan[0].phase, Phase::Skipped);
    }
}
