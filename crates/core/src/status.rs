// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime entities: builds, stages and steps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::boxes::BoxDef;
use crate::phase::Phase;
use crate::secret::Secret;
use crate::worker::WorkerDescriptor;
use crate::workflow::Workflow;

/// An execution attempt of a box, numbered per box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub box_id: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub started: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stopped: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Build {
    /// Build settings completed with the injected box/build keys the
    /// worker exposes to `when` gates and step environments.
    pub fn complete_settings(&self, box_def: Option<&BoxDef>) -> HashMap<String, String> {
        let mut settings = self.settings.clone();
        if let Some(b) = box_def {
            settings.insert("INK_BOX_NAME".to_string(), b.meta.name.clone());
            settings.insert("INK_BOX_NAMESPACE".to_string(), b.meta.namespace().to_string());
        }
        settings.insert("INK_BUILD_NUMBER".to_string(), self.number.to_string());
        settings
    }
}

/// A workflow instance inside a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub box_id: u64,
    #[serde(default)]
    pub build_id: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub name: String,
    /// Concurrency limit inherited from the workflow; 0 means unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub started: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stopped: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Single-writer claim: set once by the accepting worker.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub worker_name: String,
    #[serde(default)]
    pub worker: WorkerDescriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

/// One command within a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub stage_id: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub started: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stopped: u64,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

/// Everything a worker needs to run a claimed stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "box")]
    pub box_def: Option<BoxDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    /// The claimed stage, steps included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Stage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
}

crate::builder! {
    pub struct StageBuilder => Stage {
        into {
            name: String = "build",
        }
        set {
            id: u64 = 1,
            box_id: u64 = 1,
            build_id: u64 = 1,
            number: u64 = 1,
            phase: Phase = Phase::Pending,
            limit: u32 = 0,
            depends_on: Vec<String> = Vec::new(),
            worker: WorkerDescriptor = WorkerDescriptor::default(),
            steps: Vec<Step> = Vec::new(),
        }
    }
}
