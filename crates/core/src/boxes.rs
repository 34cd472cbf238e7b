// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Box resources: a selector-driven bundle of workflows forming a DAG.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::meta::{Metadata, KIND_WORKFLOW};
use crate::selector::{matches_opt, Selector};
use crate::workflow::Workflow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxDef {
    #[serde(flatten)]
    pub meta: Metadata,

    #[serde(default)]
    pub resources: Vec<BoxResource>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxResource {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Gates the resource entry against build settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Selector>,
    /// Filters candidate resources by labels (OR across entries of the
    /// same kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<Selector>,
}

impl BoxDef {
    /// Resolve the resource entries of `kind` against `settings`.
    ///
    /// Returns the candidate names (an empty string means "all in the
    /// namespace") and the label selectors to OR across.
    pub fn selectors(
        &self,
        kind: &str,
        settings: &HashMap<String, String>,
    ) -> (Vec<String>, Vec<Selector>) {
        let mut names = HashSet::new();
        let mut selectors = Vec::new();
        for resource in &self.resources {
            if resource.kind != kind {
                continue;
            }
            if !matches_opt(resource.when.as_ref(), settings) {
                continue;
            }
            names.insert(resource.name.clone());
            if let Some(sel) = &resource.label_selector {
                selectors.push(sel.clone());
            }
        }
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        (names, selectors)
    }

    /// Validate the box: resource entries must be addressable and the
    /// dependency graph over the given workflows must be acyclic.
    pub fn validate(&self, workflows: &[Workflow]) -> Result<(), crate::Error> {
        let edges: HashMap<&str, &[String]> = workflows
            .iter()
            .map(|w| (w.meta.name.as_str(), w.spec.depends_on.as_slice()))
            .collect();
        if has_cycle(&edges) {
            return Err(crate::Error::invalid("dependency cycle detected in workflows"));
        }

        for (index, resource) in self.resources.iter().enumerate() {
            if resource.name.is_empty()
                && resource.when.is_none()
                && resource.label_selector.is_none()
            {
                return Err(crate::Error::invalid(format!("invalid resource at index: {index}")));
            }
            if resource.kind != KIND_WORKFLOW && resource.kind != crate::meta::KIND_SECRET {
                return Err(crate::Error::invalid(format!(
                    "unsupported resource kind at index {index}: {}",
                    resource.kind
                )));
            }
            if let Some(sel) = &resource.when {
                sel.validate()?;
            }
            if let Some(sel) = &resource.label_selector {
                sel.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color DFS over name → depends_on edges. Edges to names outside
/// the graph are ignored.
fn has_cycle<'a>(edges: &HashMap<&'a str, &'a [String]>) -> bool {
    let mut colors: HashMap<&'a str, Color> = edges.keys().map(|k| (*k, Color::White)).collect();
    let nodes: Vec<&'a str> = edges.keys().copied().collect();
    for node in nodes {
        if colors[node] == Color::White && visit(node, edges, &mut colors) {
            return true;
        }
    }
    false
}

fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, &'a [String]>,
    colors: &mut HashMap<&'a str, Color>,
) -> bool {
    colors.insert(node, Color::Gray);
    if let Some(deps) = edges.get(node) {
        for dep in deps.iter() {
            match colors.get(dep.as_str()) {
                Some(Color::Gray) => return true,
                Some(Color::White) => {
                    if visit(dep.as_str(), edges, colors) {
                        return true;
                    }
                }
                _ => {}
            }
        }
    }
    colors.insert(node, Color::Black);
    false
}

#[cfg(test)]
#[path = "boxes_tests.rs"]
mod tests;
