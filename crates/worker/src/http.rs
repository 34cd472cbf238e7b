// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of the worker client contract.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use ink_core::{Data, Error, Stage, Step, WorkerDescriptor};
use ink_livelog::Line;

use crate::client::{Client, ClientError, ClientV1};

pub struct HttpClient {
    base: String,
    name: String,
    index: AtomicU32,
    worker: WorkerDescriptor,
    http: reqwest::Client,
}

impl HttpClient {
    /// `addr` is the daemon base URL; `name` is the worker identity the
    /// slot names derive from (`<name>.<slot>`).
    pub fn new(addr: &str, name: &str, mut worker: WorkerDescriptor) -> Result<Self, Error> {
        let base = addr.trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(Error::invalid(format!("invalid server address: {addr}")));
        }
        if name.is_empty() {
            return Err(Error::invalid("client name must be defined and unique"));
        }

        if worker.platform.is_none() {
            worker.platform = Some(ink_core::Platform {
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            });
        }

        Ok(Self {
            base,
            name: name.to_string(),
            index: AtomicU32::new(0),
            worker,
            http: reqwest::Client::new(),
        })
    }
}

impl Client for HttpClient {
    fn v1(&self) -> Arc<dyn ClientV1> {
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        Arc::new(HttpClientV1 {
            base: format!("{}/api/client/v1", self.base),
            name: format!("{}.{index}", self.name),
            worker: self.worker.clone(),
            http: self.http.clone(),
        })
    }
}

struct HttpClientV1 {
    base: String,
    name: String,
    worker: WorkerDescriptor,
    http: reqwest::Client,
}

impl HttpClientV1 {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Map an error response body (a single quoted JSON string) back onto
    /// the typed sentinel, or a plain HTTP error.
    async fn handle(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if !status.is_client_error() && !status.is_server_error() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<String>(&body)
            .unwrap_or_else(|_| body.trim().to_string());
        if let Some(sentinel) = Error::from_sentinel(&message) {
            return Err(ClientError::Api(sentinel));
        }
        Err(ClientError::Http { code: status.as_u16(), message })
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ClientError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::handle(resp).await
    }
}

#[async_trait]
impl ClientV1 for HttpClientV1 {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> Result<(), ClientError> {
        let resp = self.http.post(self.url("/status")).send().await?;
        Self::handle(resp).await.map(|_| ())
    }

    async fn request(&self) -> Result<Stage, ClientError> {
        loop {
            match self.post_json("/stage", &self.worker).await {
                Ok(resp) => return Ok(resp.json().await?),
                // a long-poll deadline is a reconnect, not a failure
                Err(e) if e.is_deadline() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    async fn accept(&self, stage_id: u64) -> Result<(), ClientError> {
        let url = format!("{}?name={}", self.url(&format!("/stage/{stage_id}")), self.name);
        let resp = self.http.post(url).send().await?;
        Self::handle(resp).await.map(|_| ())
    }

    async fn info(&self, stage_id: u64) -> Result<Data, ClientError> {
        let resp = self.http.get(self.url(&format!("/stage/{stage_id}"))).send().await?;
        Ok(Self::handle(resp).await?.json().await?)
    }

    async fn stage_begin(&self, stage: &Stage) -> Result<(), ClientError> {
        self.post_json(&format!("/stage/{}/begin", stage.id), stage).await.map(|_| ())
    }

    async fn stage_end(&self, stage: &Stage) -> Result<(), ClientError> {
        self.post_json(&format!("/stage/{}/end", stage.id), stage).await.map(|_| ())
    }

    async fn step_begin(&self, step: &Step) -> Result<(), ClientError> {
        self.post_json(&format!("/step/{}/begin", step.id), step).await.map(|_| ())
    }

    async fn step_end(&self, step: &Step) -> Result<(), ClientError> {
        self.post_json(&format!("/step/{}/end", step.id), step).await.map(|_| ())
    }

    async fn log_upload(
        &self,
        step_id: u64,
        lines: &[Line],
        all: bool,
    ) -> Result<(), ClientError> {
        let mut path = format!("/step/{step_id}/logs/upload");
        if all {
            path.push_str("?all=true");
        }
        self.post_json(&path, lines).await.map(|_| ())
    }

    async fn watch_cancel(&self, build_id: u64) -> Result<(), ClientError> {
        loop {
            let resp = self.http.post(self.url(&format!("/build/{build_id}/watch"))).send().await?;
            match Self::handle(resp).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_deadline() => continue,
                Err(ClientError::Api(Error::ContextCanceled)) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
