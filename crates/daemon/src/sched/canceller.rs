// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build cancellation broadcast with a grace window.
//!
//! A worker discovers a cancel via long-poll; if it reconnects shortly
//! after the broadcast, the record must still be present. Records expire
//! five minutes after the cancel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

const GRACE_WINDOW: Duration = Duration::from_secs(5 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct Canceller {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    canceled: HashMap<u64, Instant>,
}

struct Subscriber {
    build_id: u64,
    tx: oneshot::Sender<()>,
}

impl Canceller {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Record the cancellation and wake every subscriber of the build.
    pub fn cancel(&self, build_id: u64) {
        let mut inner = self.inner.lock();
        inner.canceled.insert(build_id, Instant::now() + GRACE_WINDOW);

        let matched: Vec<u64> = inner
            .subscribers
            .iter()
            .filter(|(_, sub)| sub.build_id == build_id)
            .map(|(id, _)| *id)
            .collect();
        for id in matched {
            if let Some(sub) = inner.subscribers.remove(&id) {
                let _ = sub.tx.send(());
            }
        }
        inner.collect();
    }

    /// Wait until the build is canceled, re-checking the record every ten
    /// seconds in case the broadcast raced the subscription. The caller
    /// bounds the wait; dropping the future removes the subscription.
    pub async fn canceled(&self, build_id: u64) -> bool {
        let (tx, mut rx) = oneshot::channel();
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, Subscriber { build_id, tx });
            id
        };
        let _guard = SubscriberGuard { canceller: self, id };

        loop {
            tokio::select! {
                _ = &mut rx => return true,
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if self.inner.lock().canceled.contains_key(&build_id) {
                        return true;
                    }
                }
            }
        }
    }
}

impl Inner {
    /// Garbage-collect expired cancellation records.
    fn collect(&mut self) {
        let now = Instant::now();
        self.canceled.retain(|_, expiry| now < *expiry);
    }
}

struct SubscriberGuard<'a> {
    canceller: &'a Canceller,
    id: u64,
}

impl Drop for SubscriberGuard<'_> {
    fn drop(&mut self) {
        self.canceller.inner.lock().subscribers.remove(&self.id);
    }
}

#[cfg(test)]
#[path = "canceller_tests.rs"]
mod tests;
