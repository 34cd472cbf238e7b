// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed livelog: one JSON-lines file per step under a cache dir.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{publish_line, Line, Livelog, LivelogError, LINE_MAX_BUFFER};

pub struct FileLivelog {
    dir: PathBuf,
    streams: Mutex<HashMap<u64, Arc<Mutex<Stream>>>>,
}

struct Stream {
    file: File,
    count: usize,
    subs: Vec<mpsc::Sender<Line>>,
}

impl FileLivelog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LivelogError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, streams: Mutex::new(HashMap::new()) })
    }

    fn stream(&self, id: u64) -> Result<Arc<Mutex<Stream>>, LivelogError> {
        self.streams.lock().get(&id).cloned().ok_or(LivelogError::NotFound(id))
    }

    fn path(&self, id: u64) -> PathBuf {
        self.dir.join(id.to_string())
    }

    fn open_stream(&self, id: u64) -> Result<Arc<Mutex<Stream>>, LivelogError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path(id))?;
        Ok(Arc::new(Mutex::new(Stream { file, count: 0, subs: Vec::new() })))
    }
}

impl Livelog for FileLivelog {
    fn create(&self, id: u64) -> Result<(), LivelogError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(&id) {
            return Err(LivelogError::AlreadyExists(id));
        }
        let stream = self.open_stream(id)?;
        streams.insert(id, stream);
        Ok(())
    }

    fn write(&self, id: u64, line: Line, publish: bool) -> Result<(), LivelogError> {
        let stream = self.stream(id)?;
        let mut stream = stream.lock();

        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');
        stream.file.seek(SeekFrom::End(0))?;
        stream.file.write_all(&encoded)?;
        stream.count += 1;

        if publish {
            publish_line(&mut stream.subs, &line);
        }
        Ok(())
    }

    fn list(&self, id: u64) -> Result<Vec<Line>, LivelogError> {
        let stream = self.stream(id)?;
        let mut stream = stream.lock();

        stream.file.seek(SeekFrom::Start(0))?;
        let mut lines = Vec::with_capacity(stream.count);
        let reader = BufReader::new(&stream.file);
        for raw in reader.lines() {
            let raw = raw?;
            if raw.is_empty() {
                continue;
            }
            lines.push(serde_json::from_str(&raw)?);
        }
        Ok(lines)
    }

    fn line_count(&self, id: u64) -> usize {
        self.streams.lock().get(&id).map(|s| s.lock().count).unwrap_or(0)
    }

    fn watch(&self, id: u64) -> Result<mpsc::Receiver<Line>, LivelogError> {
        let cached = self.list(id)?;
        let stream = self.stream(id)?;
        let mut stream = stream.lock();

        let (tx, rx) = mpsc::channel(LINE_MAX_BUFFER);
        for line in cached {
            let _ = tx.try_send(line);
        }
        stream.subs.push(tx);
        Ok(rx)
    }

    fn reset(&self, id: u64) -> Result<(), LivelogError> {
        let stream = {
            let mut streams = self.streams.lock();
            match streams.get(&id).cloned() {
                Some(stream) => stream,
                None => {
                    let stream = self.open_stream(id)?;
                    streams.insert(id, Arc::clone(&stream));
                    return Ok(());
                }
            }
        };
        let mut stream = stream.lock();
        stream.file.set_len(0)?;
        stream.file.seek(SeekFrom::Start(0))?;
        stream.count = 0;
        Ok(())
    }

    fn delete(&self, id: u64) -> Result<(), LivelogError> {
        // removing the stream drops the subscriber senders and the handle;
        // the backing file is removed best-effort
        self.streams.lock().remove(&id);
        match std::fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
