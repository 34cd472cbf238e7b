// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the daemon's user-facing API (`/api/core/v1`).

use std::collections::HashMap;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;

use ink_core::{BoxDef, Build, Secret, Workflow};
use ink_daemon::service::resource::Object;

pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
pub struct BuildPage {
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub items: Vec<Build>,
}

impl ApiClient {
    pub fn new(server: &str) -> anyhow::Result<Self> {
        let base = server.trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            bail!("invalid server address: {server}");
        }
        Ok(Self { base: format!("{base}/api/core/v1"), http: reqwest::Client::new() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn handle(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            let message =
                serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_string());
            bail!("{message}");
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.http.get(self.url(path)).send().await.context("request failed")?;
        Ok(Self::handle(resp).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let resp =
            self.http.post(self.url(path)).json(body).send().await.context("request failed")?;
        Ok(Self::handle(resp).await?.json().await?)
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let resp =
            self.http.put(self.url(path)).json(body).send().await.context("request failed")?;
        Ok(Self::handle(resp).await?.json().await?)
    }

    pub async fn delete(&self, kind: &str, namespace: &str, name: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/{kind}/{namespace}/{name}")))
            .send()
            .await
            .context("request failed")?;
        Self::handle(resp).await.map(|_| ())
    }

    pub async fn list_raw(&self, kind: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        self.get_json(&format!("/{kind}")).await
    }

    pub async fn get_raw(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<serde_json::Value> {
        self.get_json(&format!("/{kind}/{namespace}/{name}")).await
    }

    /// Upsert manifests in kind order: info, then update or create.
    pub async fn apply(&self, mut objects: Vec<Object>) -> anyhow::Result<()> {
        objects.sort_by_key(Object::order);
        for object in objects {
            match object {
                Object::Secret(data) => {
                    self.upsert("secret", data.meta.namespace(), &data.meta.name.clone(), &data)
                        .await?
                }
                Object::Workflow(data) => {
                    self.upsert("workflow", data.meta.namespace(), &data.meta.name.clone(), &data)
                        .await?
                }
                Object::BoxDef(data) => {
                    self.upsert("box", data.meta.namespace(), &data.meta.name.clone(), &data)
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn upsert<T: Serialize + DeserializeOwned>(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        data: &T,
    ) -> anyhow::Result<()> {
        let exists = self
            .get_json::<serde_json::Value>(&format!("/{kind}/{namespace}/{name}"))
            .await
            .is_ok();
        if exists {
            let _: T = self.put_json(&format!("/{kind}/{namespace}/{name}"), data).await?;
            println!("{kind}/{name} configured");
        } else {
            let _: T = self.post_json(&format!("/{kind}"), data).await?;
            println!("{kind}/{name} created");
        }
        Ok(())
    }

    pub async fn secret_info(&self, namespace: &str, name: &str) -> anyhow::Result<Secret> {
        self.get_json(&format!("/secret/{namespace}/{name}")).await
    }

    pub async fn workflow_info(&self, namespace: &str, name: &str) -> anyhow::Result<Workflow> {
        self.get_json(&format!("/workflow/{namespace}/{name}")).await
    }

    pub async fn box_info(&self, namespace: &str, name: &str) -> anyhow::Result<BoxDef> {
        self.get_json(&format!("/box/{namespace}/{name}")).await
    }

    pub async fn build_create(
        &self,
        namespace: &str,
        name: &str,
        settings: &HashMap<String, String>,
    ) -> anyhow::Result<u64> {
        self.post_json(&format!("/box/{namespace}/{name}/build"), settings).await
    }

    pub async fn build_list(
        &self,
        namespace: &str,
        name: &str,
        page: u64,
        size: u64,
    ) -> anyhow::Result<BuildPage> {
        self.get_json(&format!("/box/{namespace}/{name}/build?page={page}&size={size}")).await
    }

    pub async fn build_info(
        &self,
        namespace: &str,
        name: &str,
        number: u64,
    ) -> anyhow::Result<Build> {
        self.get_json(&format!("/box/{namespace}/{name}/build/{number}")).await
    }

    pub async fn build_cancel(
        &self,
        namespace: &str,
        name: &str,
        number: u64,
    ) -> anyhow::Result<()> {
        let _: String =
            self.post_json(&format!("/box/{namespace}/{name}/build/{number}/cancel"), &()).await?;
        Ok(())
    }
}
