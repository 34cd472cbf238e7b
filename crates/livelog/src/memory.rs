// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory livelog backend, the daemon default.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::{publish_line, Line, Livelog, LivelogError, LINE_MAX_BUFFER};

#[derive(Default)]
pub struct MemoryLivelog {
    streams: Mutex<HashMap<u64, Stream>>,
}

#[derive(Default)]
struct Stream {
    lines: Vec<Line>,
    subs: Vec<mpsc::Sender<Line>>,
}

impl MemoryLivelog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Livelog for MemoryLivelog {
    fn create(&self, id: u64) -> Result<(), LivelogError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(&id) {
            return Err(LivelogError::AlreadyExists(id));
        }
        streams.insert(id, Stream::default());
        Ok(())
    }

    fn write(&self, id: u64, line: Line, publish: bool) -> Result<(), LivelogError> {
        let mut streams = self.streams.lock();
        let stream = streams.get_mut(&id).ok_or(LivelogError::NotFound(id))?;
        stream.lines.push(line.clone());
        if publish {
            publish_line(&mut stream.subs, &line);
        }
        Ok(())
    }

    fn list(&self, id: u64) -> Result<Vec<Line>, LivelogError> {
        let streams = self.streams.lock();
        let stream = streams.get(&id).ok_or(LivelogError::NotFound(id))?;
        Ok(stream.lines.clone())
    }

    fn line_count(&self, id: u64) -> usize {
        self.streams.lock().get(&id).map(|s| s.lines.len()).unwrap_or(0)
    }

    fn watch(&self, id: u64) -> Result<mpsc::Receiver<Line>, LivelogError> {
        let mut streams = self.streams.lock();
        let stream = streams.get_mut(&id).ok_or(LivelogError::NotFound(id))?;

        let (tx, rx) = mpsc::channel(LINE_MAX_BUFFER);
        for line in &stream.lines {
            // snapshot overflow is dropped, same as live overflow
            let _ = tx.try_send(line.clone());
        }
        stream.subs.push(tx);
        Ok(rx)
    }

    fn reset(&self, id: u64) -> Result<(), LivelogError> {
        let mut streams = self.streams.lock();
        match streams.get_mut(&id) {
            Some(stream) => {
                stream.lines.clear();
                Ok(())
            }
            None => {
                streams.insert(id, Stream::default());
                Ok(())
            }
        }
    }

    fn delete(&self, id: u64) -> Result<(), LivelogError> {
        // dropping the stream drops every subscriber sender, which closes
        // the watcher channels
        self.streams.lock().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
