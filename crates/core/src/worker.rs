// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker capability descriptor used for queue matching.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    #[serde(default)]
    pub kind: WorkerKind,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Target platform of a worker or workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    #[default]
    Docker,
    Host,
    Kubernetes,
    Ssh,
}

crate::simple_display! {
    WorkerKind {
        Docker => "docker",
        Host => "host",
        Kubernetes => "kubernetes",
        Ssh => "ssh",
    }
}

impl std::str::FromStr for WorkerKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(WorkerKind::Docker),
            "host" => Ok(WorkerKind::Host),
            "kubernetes" => Ok(WorkerKind::Kubernetes),
            "ssh" => Ok(WorkerKind::Ssh),
            other => Err(crate::Error::invalid(format!("unknown worker kind: {other}"))),
        }
    }
}
