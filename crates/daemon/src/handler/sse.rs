// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-sent-event streaming of live step logs.
//!
//! Event grammar:
//!
//! ```text
//! event: data\ndata: {json}\n\n      one log line
//! event: error\ndata: eof\n\n       end of stream
//! : ping\n\n                        keepalive comment, every 30s
//! ```

use std::time::Duration;

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ink_livelog::Line;

use crate::service::Services;

const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Hard cap on a single watch connection.
const WATCH_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Build the SSE response for a step's live log and spawn its pump.
pub fn stream(services: Services, step_id: u64) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::convert::Infallible>>(64);
    tokio::spawn(pump(services, step_id, tx));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

async fn pump(
    services: Services,
    step_id: u64,
    tx: mpsc::Sender<Result<Bytes, std::convert::Infallible>>,
) {
    let send = |frame: String| {
        let tx = tx.clone();
        async move { tx.send(Ok(Bytes::from(frame))).await.is_ok() }
    };

    if !send(": ping\n\n".to_string()).await {
        return;
    }

    // a missing stream means the step already ended: immediate eof
    let mut lines = match services.livelog.watch(step_id) {
        Ok(lines) => lines,
        Err(_) => {
            let _ = send(data_event_eof()).await;
            return;
        }
    };

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // the first tick fires immediately
    let deadline = tokio::time::sleep(WATCH_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    if !send(data_event(&line)).await {
                        return;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if !send(": ping\n\n".to_string()).await {
                    return;
                }
            }
            _ = &mut deadline => break,
            _ = tx.closed() => return,
        }
    }

    let _ = send(data_event_eof()).await;
}

fn data_event(line: &Line) -> String {
    let payload = serde_json::to_string(line).unwrap_or_else(|_| "null".to_string());
    format!("event: data\ndata: {payload}\n\n")
}

fn data_event_eof() -> String {
    "event: error\ndata: eof\n\n".to_string()
}
