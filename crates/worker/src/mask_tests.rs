// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

#[derive(Default)]
struct Capture {
    data: Mutex<Vec<u8>>,
    closed: Mutex<bool>,
}

impl StreamWriter for Capture {
    fn write(&self, data: &[u8]) {
        self.data.lock().extend_from_slice(data);
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }
}

fn masked_output(values: &[&str], input: &[u8]) -> String {
    let capture = Arc::new(Capture::default());
    let writer =
        MaskWriter::wrap(capture.clone(), &values.iter().map(|v| v.to_string()).collect::<Vec<_>>());
    writer.write(input);
    let bytes = capture.data.lock().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn secret_values_are_replaced_with_asterisks() {
    let out = masked_output(&["hunter2"], b"the password is hunter2, use it");
    assert_eq!(out, "the password is ******, use it");
}

#[test]
fn every_occurrence_is_masked() {
    let out = masked_output(&["tok"], b"tok tok tok");
    assert_eq!(out, "****** ****** ******");
}

#[test]
fn multi_line_values_mask_each_trimmed_fragment() {
    let out = masked_output(&["line-one\n  line-two  "], b"a line-one b line-two c");
    assert_eq!(out, "a ****** b ****** c");
}

#[test]
fn short_fragments_are_not_masked() {
    let out = masked_output(&["a", " x ", ""], b"a x aa");
    assert_eq!(out, "a x aa");
}

#[test]
fn no_patterns_returns_the_inner_writer() {
    let capture = Arc::new(Capture::default());
    let writer = MaskWriter::wrap(capture.clone(), &["".to_string(), "x".to_string()]);
    writer.write(b"untouched");
    assert_eq!(capture.data.lock().as_slice(), b"untouched");
}

#[test]
fn close_propagates() {
    let capture = Arc::new(Capture::default());
    let writer = MaskWriter::wrap(capture.clone(), &["secret".to_string()]);
    writer.close();
    assert!(*capture.closed.lock());
}

#[test]
fn masked_stream_never_contains_a_long_secret() {
    let secret = "s3cr3t-value-42";
    let mut payload = Vec::new();
    for n in 0..50 {
        payload.extend_from_slice(format!("line {n}: {secret}\n").as_bytes());
    }
    let out = masked_output(&[secret], &payload);
    assert!(!out.contains(secret));
    assert_eq!(out.matches(MASK).count(), 50);
}
