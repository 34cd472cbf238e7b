// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ink worker`: poll the daemon and execute stages.

use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ink_core::{WorkerDescriptor, WorkerKind};
use ink_worker::hook::{DockerHook, HostHook};
use ink_worker::{Hook, HttpClient, Runner};

use super::parse_settings;

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker kind: docker or host.
    #[arg(long, env = "INK_WORKER_KIND", default_value = "docker")]
    pub kind: WorkerKindArg,

    /// Concurrent worker slots.
    #[arg(long, env = "INK_WORKER_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Capability labels, repeatable (`--labels pool=gpu`).
    #[arg(long = "labels", value_name = "K=V")]
    pub labels: Vec<String>,

    /// Worker identity; defaults to `<hostname>.<kind>`.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum WorkerKindArg {
    Docker,
    Host,
}

pub async fn run(server: &str, args: WorkerArgs) -> anyhow::Result<()> {
    let kind = match args.kind {
        WorkerKindArg::Docker => WorkerKind::Docker,
        WorkerKindArg::Host => WorkerKind::Host,
    };
    let hook: Arc<dyn Hook> = match kind {
        WorkerKind::Docker => Arc::new(DockerHook::new()),
        _ => Arc::new(HostHook::new()),
    };

    let name = match args.name {
        Some(name) => name,
        None => format!("{}.{kind}", hostname()),
    };
    let descriptor = WorkerDescriptor {
        kind,
        labels: parse_settings(&args.labels)?,
        ..Default::default()
    };

    let client = Arc::new(HttpClient::new(server, &name, descriptor)?);
    let runner = Runner::new(client, hook, args.count);

    let token = CancellationToken::new();
    let signal = token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        signal.cancel();
    });

    info!(%name, count = args.count, "worker started");
    runner.run(token).await;
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "worker".to_string())
}
