// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command definitions and dispatch.

mod build;
mod daemon;
mod exec;
mod resource;
mod worker;

use clap::{Args, Parser, Subcommand};

/// The ink build system.
#[derive(Debug, Parser)]
#[command(name = "ink", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct Global {
    /// Daemon address.
    #[arg(long, global = true, env = "INK_SERVER", default_value = "http://127.0.0.1:2638")]
    pub server: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the build daemon.
    Daemon,

    /// Run a worker against the daemon.
    Worker(worker::WorkerArgs),

    /// Create or update resources from manifests.
    Apply(ApplyArgs),

    /// Run a box locally, without a daemon.
    Exec(exec::ExecArgs),

    /// Manage secrets.
    Secret {
        #[command(subcommand)]
        action: resource::ResourceAction,
    },

    /// Manage workflows.
    Workflow {
        #[command(subcommand)]
        action: resource::ResourceAction,
    },

    /// Manage boxes.
    #[command(name = "box")]
    BoxCmd {
        #[command(subcommand)]
        action: resource::BoxAction,
    },

    /// Manage builds.
    Build {
        #[command(subcommand)]
        action: build::BuildAction,
    },
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Manifest file or directory.
    #[arg(short = 'f', long = "filename")]
    pub filename: std::path::PathBuf,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let api = crate::client::ApiClient::new(&self.global.server)?;
        match self.command {
            Command::Daemon => daemon::run().await,
            Command::Worker(args) => worker::run(&self.global.server, args).await,
            Command::Apply(args) => {
                let objects = crate::manifest::load(&args.filename)?;
                api.apply(objects).await
            }
            Command::Exec(args) => exec::run(args).await,
            Command::Secret { action } => action.run(&api, "secret").await,
            Command::Workflow { action } => action.run(&api, "workflow").await,
            Command::BoxCmd { action } => action.run(&api).await,
            Command::Build { action } => action.run(&api).await,
        }
    }
}

/// Split `[namespace/]name`; a missing namespace means `default`.
pub fn split_name(arg: &str) -> (String, String) {
    match arg.split_once('/') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (ink_core::DEFAULT_NAMESPACE.to_string(), arg.to_string()),
    }
}

/// Parse repeated `k=v` settings flags.
pub fn parse_settings(
    sets: &[String],
) -> anyhow::Result<std::collections::HashMap<String, String>> {
    let mut settings = std::collections::HashMap::new();
    for set in sets {
        let Some((key, value)) = set.split_once('=') else {
            anyhow::bail!("invalid --set value (expected k=v): {set}");
        };
        settings.insert(key.to_string(), value.to_string());
    }
    Ok(settings)
}
