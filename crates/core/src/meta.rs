// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object metadata: the `(kind, namespace, name)` identity plus labels.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Namespace used when a write carries a blank namespace.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Blank namespace: "all namespaces" for list operations.
pub const ALL_NAMESPACE: &str = "";

pub const KIND_BOX: &str = "Box";
pub const KIND_WORKFLOW: &str = "Workflow";
pub const KIND_SECRET: &str = "Secret";

/// Label gating whether a resource participates in wildcard expansion.
pub const LABEL_STATUS: &str = "ink.io/status";
pub const STATUS_DISABLE: &str = "disable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub creation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion: Option<u64>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Metadata {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Metadata { namespace: namespace.into(), name: name.into(), ..Default::default() }
    }

    /// The effective namespace: blank resolves to `default`.
    pub fn namespace(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// True when the resource carries `ink.io/status: disable`.
    pub fn is_disabled(&self) -> bool {
        self.labels.get(LABEL_STATUS).is_some_and(|v| v == STATUS_DISABLE)
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "namespace={}, kind={}, name={}", self.namespace(), self.kind, self.name)
    }
}
