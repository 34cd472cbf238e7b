// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced log writer used by workers.
//!
//! Output bytes are split into [`Line`]s as they arrive; a background task
//! flushes batches roughly once per second. Closing the writer emits the
//! full accumulated log as an authoritative (`all = true`) batch.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::Line;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// A batch of lines plus the `all` flag of the upload contract.
pub type LineBatch = (Vec<Line>, bool);

/// Byte sink for step output. Implementations must tolerate concurrent
/// writers of stdout and stderr.
pub trait StreamWriter: Send + Sync {
    fn write(&self, data: &[u8]);
    fn close(&self);
}

pub struct LogWriter {
    state: Mutex<State>,
    tx: mpsc::UnboundedSender<LineBatch>,
}

struct State {
    number: u64,
    started: Instant,
    pending: Vec<Line>,
    history: Vec<Line>,
    closed: bool,
}

impl LogWriter {
    /// Create a writer emitting batches on `tx` and spawn its flusher.
    /// Must be called from within a tokio runtime.
    pub fn spawn(tx: mpsc::UnboundedSender<LineBatch>) -> Arc<Self> {
        let writer = Arc::new(Self::new(tx));
        let flusher = Arc::clone(&writer);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(FLUSH_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if !flusher.flush() {
                    break;
                }
            }
        });
        writer
    }

    fn new(tx: mpsc::UnboundedSender<LineBatch>) -> Self {
        Self {
            state: Mutex::new(State {
                number: 0,
                started: Instant::now(),
                pending: Vec::new(),
                history: Vec::new(),
                closed: false,
            }),
            tx,
        }
    }

    /// Emit pending lines as an incremental batch. Returns false once the
    /// writer is closed and the flusher should stop.
    pub fn flush(&self) -> bool {
        let batch = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.pending.is_empty() {
                return true;
            }
            std::mem::take(&mut state.pending)
        };
        let _ = self.tx.send((batch, false));
        true
    }
}

impl StreamWriter for LogWriter {
    fn write(&self, data: &[u8]) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        let since = state.started.elapsed().as_secs();
        for part in split_lines(data) {
            let line = Line { number: state.number, since, content: part };
            state.number += 1;
            state.pending.push(line.clone());
            state.history.push(line);
        }
    }

    fn close(&self) {
        let history = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.pending.clear();
            std::mem::take(&mut state.history)
        };
        if !history.is_empty() {
            let _ = self.tx.send((history, true));
        }
    }
}

/// Split an output chunk into line parts, keeping trailing newlines, the
/// way step output is rendered line by line.
pub fn split_lines(data: &[u8]) -> Vec<String> {
    let s = String::from_utf8_lossy(data);
    let trimmed = s.strip_suffix('\n').unwrap_or(&s);
    if !trimmed.contains('\n') {
        return vec![s.into_owned()];
    }
    let mut parts = Vec::new();
    let mut rest = s.as_ref();
    while let Some(idx) = rest.find('\n') {
        parts.push(rest[..=idx].to_string());
        rest = &rest[idx + 1..];
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
