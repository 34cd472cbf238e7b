// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource verbs: `list`, `get`, `delete` for secrets, workflows and
//! boxes, plus `box trigger`.

use clap::Subcommand;

use crate::client::ApiClient;
use crate::output;

use super::{parse_settings, split_name};

#[derive(Debug, Subcommand)]
pub enum ResourceAction {
    /// List resources across namespaces.
    List,
    /// Show one resource as YAML.
    Get {
        /// `[namespace/]name`
        name: String,
    },
    /// Delete one resource.
    Delete {
        /// `[namespace/]name`
        name: String,
    },
}

impl ResourceAction {
    pub async fn run(self, api: &ApiClient, kind: &str) -> anyhow::Result<()> {
        match self {
            ResourceAction::List => list(api, kind).await,
            ResourceAction::Get { name } => {
                let (namespace, name) = split_name(&name);
                let value = api.get_raw(kind, &namespace, &name).await?;
                print!("{}", serde_yaml::to_string(&value)?);
                Ok(())
            }
            ResourceAction::Delete { name } => {
                let (namespace, name) = split_name(&name);
                api.delete(kind, &namespace, &name).await?;
                println!("{kind}/{name} deleted");
                Ok(())
            }
        }
    }
}

async fn list(api: &ApiClient, kind: &str) -> anyhow::Result<()> {
    let items = api.list_raw(kind).await?;
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.get("namespace").and_then(|v| v.as_str()).unwrap_or("default").to_string(),
                item.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            ]
        })
        .collect();
    output::table(&["NAMESPACE", "NAME"], &rows);
    Ok(())
}

#[derive(Debug, Subcommand)]
pub enum BoxAction {
    /// List boxes across namespaces.
    List,
    /// Show one box as YAML.
    Get {
        /// `[namespace/]name`
        name: String,
    },
    /// Delete one box.
    Delete {
        /// `[namespace/]name`
        name: String,
    },
    /// Trigger a build of the box.
    Trigger {
        /// `[namespace/]name`
        name: String,
        /// Build settings, repeatable (`--set k=v`).
        #[arg(long = "set", value_name = "K=V")]
        sets: Vec<String>,
    },
}

impl BoxAction {
    pub async fn run(self, api: &ApiClient) -> anyhow::Result<()> {
        match self {
            BoxAction::List => ResourceAction::List.run(api, "box").await,
            BoxAction::Get { name } => ResourceAction::Get { name }.run(api, "box").await,
            BoxAction::Delete { name } => ResourceAction::Delete { name }.run(api, "box").await,
            BoxAction::Trigger { name, sets } => {
                let (namespace, name) = split_name(&name);
                let settings = parse_settings(&sets)?;
                let number = api.build_create(&namespace, &name, &settings).await?;
                println!("build {number} created");
                Ok(())
            }
        }
    }
}
