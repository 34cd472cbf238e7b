// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build verbs: `create`, `get`, `list`, `cancel`.

use clap::Subcommand;

use crate::client::ApiClient;
use crate::output;

use super::{parse_settings, split_name};

#[derive(Debug, Subcommand)]
pub enum BuildAction {
    /// Trigger a build of a box.
    Create {
        /// `[namespace/]name`
        name: String,
        /// Build settings, repeatable (`--set k=v`).
        #[arg(long = "set", value_name = "K=V")]
        sets: Vec<String>,
    },
    /// Show a build, stages and steps included.
    Get {
        /// `[namespace/]name`
        name: String,
        number: u64,
    },
    /// List builds of a box, newest first.
    List {
        /// `[namespace/]name`
        name: String,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 10)]
        size: u64,
    },
    /// Cancel a running or pending build.
    Cancel {
        /// `[namespace/]name`
        name: String,
        number: u64,
    },
}

impl BuildAction {
    pub async fn run(self, api: &ApiClient) -> anyhow::Result<()> {
        match self {
            BuildAction::Create { name, sets } => {
                let (namespace, name) = split_name(&name);
                let settings = parse_settings(&sets)?;
                let number = api.build_create(&namespace, &name, &settings).await?;
                println!("build {number} created");
                Ok(())
            }
            BuildAction::Get { name, number } => {
                let (namespace, name) = split_name(&name);
                let build = api.build_info(&namespace, &name, number).await?;

                println!("build:  #{} ({})", build.number, build.phase);
                let mut rows = Vec::new();
                for stage in &build.stages {
                    rows.push(vec![
                        stage.name.clone(),
                        String::new(),
                        stage.phase.to_string(),
                        output::elapsed(stage.started, stage.stopped),
                    ]);
                    for step in &stage.steps {
                        rows.push(vec![
                            String::new(),
                            step.name.clone(),
                            step.phase.to_string(),
                            output::elapsed(step.started, step.stopped),
                        ]);
                    }
                }
                output::table(&["STAGE", "STEP", "PHASE", "ELAPSED"], &rows);
                Ok(())
            }
            BuildAction::List { name, page, size } => {
                let (namespace, name) = split_name(&name);
                let result = api.build_list(&namespace, &name, page, size).await?;
                let rows: Vec<Vec<String>> = result
                    .items
                    .iter()
                    .map(|b| {
                        vec![
                            format!("#{}", b.number),
                            b.phase.to_string(),
                            output::elapsed(b.started, b.stopped),
                        ]
                    })
                    .collect();
                output::table(&["BUILD", "PHASE", "ELAPSED"], &rows);
                println!("page {}/{} (total {})", result.page, result.size, result.total);
                Ok(())
            }
            BuildAction::Cancel { name, number } => {
                let (namespace, name) = split_name(&name);
                api.build_cancel(&namespace, &name, number).await?;
                println!("build {number} canceled");
                Ok(())
            }
        }
    }
}
