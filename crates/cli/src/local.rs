// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process worker client for `ink exec`: callbacks go straight to the
//! daemon services instead of over HTTP, and incremental log lines print
//! to stdout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ink_core::{Data, Error, Phase, Stage, Step};
use ink_daemon::service::{stage, Services};
use ink_livelog::Line;
use ink_worker::{Client, ClientError, ClientV1};

#[derive(Clone)]
pub struct LocalClient {
    services: Services,
    build_id: u64,
}

impl LocalClient {
    pub fn new(services: Services, build_id: u64) -> Self {
        Self { services, build_id }
    }
}

impl Client for LocalClient {
    fn v1(&self) -> Arc<dyn ClientV1> {
        Arc::new(self.clone())
    }
}

fn to_client(err: Error) -> ClientError {
    ClientError::Api(err)
}

#[async_trait]
impl ClientV1 for LocalClient {
    fn name(&self) -> &str {
        "local"
    }

    async fn status(&self) -> Result<(), ClientError> {
        Ok(())
    }

    /// Poll the store for the next pending stage, regardless of the
    /// declared worker kind: exec runs everything in-process.
    async fn request(&self) -> Result<Stage, ClientError> {
        loop {
            let build =
                self.services.store.build_get(self.build_id).await.map_err(to_client)?;
            let pending = self
                .services
                .store
                .stage_list_pending()
                .await
                .map_err(to_client)?
                .into_iter()
                .find(|s| s.build_id == self.build_id);

            match pending {
                Some(stage) => return Ok(stage),
                None if build.phase.is_done() => {
                    return Err(ClientError::Api(Error::Canceled));
                }
                None => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    }

    async fn accept(&self, stage_id: u64) -> Result<(), ClientError> {
        stage::accept(&self.services, stage_id, "local").await.map_err(to_client)
    }

    async fn info(&self, stage_id: u64) -> Result<Data, ClientError> {
        stage::info(&self.services, stage_id).await.map_err(to_client)
    }

    async fn stage_begin(&self, data: &Stage) -> Result<(), ClientError> {
        stage::begin(&self.services, data.clone()).await.map_err(to_client)
    }

    async fn stage_end(&self, data: &Stage) -> Result<(), ClientError> {
        stage::end(&self.services, data.clone()).await.map_err(to_client)
    }

    async fn step_begin(&self, data: &Step) -> Result<(), ClientError> {
        stage::step_begin(&self.services, data.clone()).await.map(|_| ()).map_err(to_client)
    }

    async fn step_end(&self, data: &Step) -> Result<(), ClientError> {
        stage::step_end(&self.services, data.clone()).await.map(|_| ()).map_err(to_client)
    }

    async fn log_upload(
        &self,
        step_id: u64,
        lines: &[Line],
        all: bool,
    ) -> Result<(), ClientError> {
        if !all {
            for line in lines {
                print!("{}", line.content);
            }
        }
        stage::log_upload(&self.services, step_id, lines.to_vec(), all)
            .await
            .map_err(to_client)
    }

    async fn watch_cancel(&self, build_id: u64) -> Result<(), ClientError> {
        self.services.sched.canceled(build_id).await;
        Ok(())
    }
}

/// Wait until the build reaches a terminal phase, polling the store.
pub async fn wait_for_build(services: &Services, build_id: u64) -> Result<Phase, Error> {
    loop {
        let build = services.store.build_get(build_id).await?;
        if build.phase.is_done() {
            return Ok(build.phase);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
