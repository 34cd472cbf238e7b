// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ink exec`: run a box locally, without a daemon.
//!
//! Manifests are applied into an in-memory store, a build is created the
//! same way the daemon would, and a single in-process worker drives every
//! stage through the host hook.

use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;

use ink_daemon::service::{build, resource, Services};
use ink_daemon::MemoryStore;
use ink_livelog::MemoryLivelog;
use ink_worker::hook::HostHook;
use ink_worker::Runner;

use crate::local::{wait_for_build, LocalClient};
use crate::manifest;

use super::parse_settings;

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Manifest file or directory.
    #[arg(short = 'f', long = "filename")]
    pub filename: std::path::PathBuf,

    /// Build settings, repeatable (`--set k=v`).
    #[arg(long = "set", value_name = "K=V")]
    pub sets: Vec<String>,
}

pub async fn run(args: ExecArgs) -> anyhow::Result<()> {
    let objects = manifest::load(&args.filename)?;
    let box_meta = objects
        .iter()
        .find_map(|o| match o {
            resource::Object::BoxDef(b) => Some(b.meta.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow::anyhow!("no box manifest found"))?;

    let services =
        Services::new(Arc::new(MemoryStore::new()), Arc::new(MemoryLivelog::new()));
    resource::apply(&services, objects).await?;

    let settings = parse_settings(&args.sets)?;
    let number =
        build::create(&services, box_meta.namespace(), &box_meta.name, settings).await?;
    let build_row =
        services.store.build_info(box_id(&services, &box_meta).await?, number).await?;

    let client = LocalClient::new(services.clone(), build_row.id);
    let runner = Arc::new(Runner::new(Arc::new(client), Arc::new(HostHook::new()), 1));

    let token = CancellationToken::new();
    let worker = {
        let runner = Arc::clone(&runner);
        let token = token.clone();
        tokio::spawn(async move { runner.run(token).await })
    };

    let phase = wait_for_build(&services, build_row.id).await?;
    token.cancel();
    let _ = worker.await;

    let final_build =
        build::info(&services, box_meta.namespace(), &box_meta.name, number).await?;
    for stage in &final_build.stages {
        println!("stage {}: {}", stage.name, stage.phase);
    }
    println!("build #{number}: {phase}");

    if !phase.is_succeeded() {
        anyhow::bail!("build finished {phase}");
    }
    Ok(())
}

async fn box_id(
    services: &Services,
    meta: &ink_core::Metadata,
) -> anyhow::Result<u64> {
    Ok(services.store.box_info(meta.namespace(), &meta.name).await?.meta.id)
}
