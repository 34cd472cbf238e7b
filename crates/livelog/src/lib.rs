// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ink-livelog: per-step append-only line streams.
//!
//! A stream is created at step begin, fans out to any number of watchers
//! while the step runs, and is deleted at step end after its contents are
//! persisted. Watchers receive a snapshot of buffered lines followed by
//! live lines; end-of-stream is signalled by channel close.

mod file;
mod memory;
mod writer;

pub use file::FileLivelog;
pub use memory::MemoryLivelog;
pub use writer::{split_lines, LineBatch, LogWriter, StreamWriter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered lines per watcher; beyond this, lines are dropped for the slow
/// watcher only and the stream continues.
pub const LINE_MAX_BUFFER: usize = 3000;

/// One log line of a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub number: u64,
    /// Seconds since the step started.
    pub since: u64,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum LivelogError {
    #[error("log stream not found for {0}")]
    NotFound(u64),

    #[error("log stream already exists for {0}")]
    AlreadyExists(u64),

    #[error("log line encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A live log store.
///
/// `write` appends to storage and, unless `publish` is false, fans the line
/// out to every watcher. `watch` replays buffered lines then follows live.
pub trait Livelog: Send + Sync {
    fn create(&self, id: u64) -> Result<(), LivelogError>;
    fn write(&self, id: u64, line: Line, publish: bool) -> Result<(), LivelogError>;
    fn list(&self, id: u64) -> Result<Vec<Line>, LivelogError>;
    fn line_count(&self, id: u64) -> usize;
    fn watch(&self, id: u64) -> Result<mpsc::Receiver<Line>, LivelogError>;
    fn reset(&self, id: u64) -> Result<(), LivelogError>;
    fn delete(&self, id: u64) -> Result<(), LivelogError>;
}

/// Publish a line to a watcher set, pruning closed watchers.
///
/// A watcher whose buffer is full misses the line but stays subscribed.
fn publish_line(subs: &mut Vec<mpsc::Sender<Line>>, line: &Line) {
    subs.retain(|sub| match sub.try_send(line.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}
