// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret masking: a pass-through writer that replaces secret values with
//! asterisks before any byte leaves the worker.

use std::sync::Arc;

use ink_livelog::StreamWriter;

const MASK: &str = "******";

pub struct MaskWriter {
    inner: Arc<dyn StreamWriter>,
    patterns: Vec<String>,
}

impl MaskWriter {
    /// Wrap `inner`, masking every occurrence of the given secret values.
    ///
    /// Values are split on newlines and trimmed; fragments shorter than
    /// two bytes are not masked. With nothing to mask the inner writer is
    /// returned untouched.
    pub fn wrap(inner: Arc<dyn StreamWriter>, values: &[String]) -> Arc<dyn StreamWriter> {
        let mut patterns = Vec::new();
        for value in values {
            if value.is_empty() {
                continue;
            }
            for part in value.split('\n') {
                let part = part.trim();
                if part.len() < 2 {
                    continue;
                }
                patterns.push(part.to_string());
            }
        }
        if patterns.is_empty() {
            return inner;
        }
        Arc::new(MaskWriter { inner, patterns })
    }
}

impl StreamWriter for MaskWriter {
    fn write(&self, data: &[u8]) {
        let mut masked = String::from_utf8_lossy(data).into_owned();
        for pattern in &self.patterns {
            if masked.contains(pattern.as_str()) {
                masked = masked.replace(pattern.as_str(), MASK);
            }
        }
        self.inner.write(masked.as_bytes());
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
