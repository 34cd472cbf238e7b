// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime workflow compilation: the workflow resource plus the claimed
//! stage and its secrets become the concrete execution plan the hooks
//! consume.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use ink_core::{
    PullPolicy, Secret, Stage, Volume, VolumeDevice, VolumeMount, Workflow, WorkerDescriptor,
};

/// Default in-container workspace.
pub const WORKSPACE_PATH: &str = "/ink/src";
/// The implicit shared workspace volume every step mounts.
pub const WORKSPACE_VOLUME: &str = "_ink_volume";

const SECRET_DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

#[derive(Debug, Clone)]
pub struct RuntimeWorkflow {
    /// Unique stage handle, used to name runtime resources.
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub labels: HashMap<String, String>,

    pub steps: Vec<RuntimeStep>,
    pub working_dir: String,
    pub concurrency: u32,
    pub volumes: Vec<RuntimeVolume>,
    pub depends_on: Vec<String>,
    pub worker: WorkerDescriptor,
}

#[derive(Debug, Clone)]
pub struct RuntimeVolume {
    pub id: String,
    pub volume: Volume,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeStep {
    /// Unique step handle, used to name containers and script files.
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_pull_policy: PullPolicy,
    /// `user:password` auth for the image registry, base64-encoded.
    pub image_pull_auth: String,
    pub privileged: bool,
    pub working_dir: String,
    pub env: HashMap<String, String>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub entrypoint: Vec<String>,
    pub shell: Vec<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub volume_mounts: Vec<VolumeMount>,
    pub devices: Vec<VolumeDevice>,
}

impl RuntimeWorkflow {
    /// Build the runtime plan from the API objects.
    ///
    /// Step handles come from the stage's step rows; a template step with
    /// no matching row is an error.
    pub fn convert(
        workflow: &Workflow,
        status: &Stage,
        secrets: &[Secret],
    ) -> Result<Self, ink_core::Error> {
        let mut out = RuntimeWorkflow {
            id: handle(status.id),
            name: workflow.meta.name.clone(),
            namespace: workflow.meta.namespace().to_string(),
            labels: workflow.meta.labels.clone(),
            steps: Vec::with_capacity(workflow.spec.steps.len()),
            working_dir: workflow.spec.working_dir.clone(),
            concurrency: workflow.spec.concurrency,
            volumes: workflow
                .spec
                .volumes
                .iter()
                .map(|v| RuntimeVolume { id: String::new(), volume: v.clone() })
                .collect(),
            depends_on: workflow.spec.depends_on.clone(),
            worker: workflow.worker(),
        };

        let pull_secrets: Vec<&Secret> = workflow
            .spec
            .image_pull_secrets
            .iter()
            .filter_map(|name| secrets.iter().find(|s| &s.meta.name == name))
            .collect();

        for template in &workflow.spec.steps {
            let id = status
                .steps
                .iter()
                .find(|s| s.name == template.name)
                .map(|s| s.id)
                .ok_or_else(|| {
                    ink_core::Error::invalid(format!("step not found: {}", template.name))
                })?;

            let mut env = HashMap::new();
            for var in &template.env {
                if var.name.is_empty() {
                    continue;
                }
                if !var.value.is_empty() {
                    env.insert(var.name.clone(), var.value.clone());
                    continue;
                }
                if let Some(key_ref) =
                    var.value_from.as_ref().and_then(|s| s.secret_key_ref.as_ref())
                {
                    if let Some(value) = Secret::find_key(secrets, &key_ref.name, &key_ref.key) {
                        env.insert(var.name.clone(), value);
                    }
                }
            }
            for (k, v) in &template.settings {
                if k.is_empty() || v.is_empty() {
                    continue;
                }
                env.insert(k.clone(), v.clone());
            }

            out.steps.push(RuntimeStep {
                id: handle(id),
                name: template.name.clone(),
                image: template.image.clone(),
                image_pull_policy: template
                    .image_pull_policy
                    .unwrap_or(PullPolicy::IfNotPresent),
                image_pull_auth: registry_auth(&pull_secrets, &template.image),
                privileged: template.privileged,
                working_dir: template.working_dir.clone(),
                env,
                dns: template.dns.clone(),
                dns_search: template.dns_search.clone(),
                extra_hosts: template.extra_hosts.clone(),
                entrypoint: template.entrypoint.clone(),
                shell: template.shell.clone(),
                command: template.command.clone(),
                args: template.args.clone(),
                volume_mounts: template.volume_mounts.clone(),
                devices: template.devices.clone(),
            });
        }

        out.compile();
        Ok(out)
    }

    /// Apply runtime defaults: working dir, the implicit workspace
    /// volume, per-step pull policy and mount wiring.
    fn compile(&mut self) {
        if self.working_dir.is_empty() {
            self.working_dir = WORKSPACE_PATH.to_string();
        } else if !Path::new(&self.working_dir).is_absolute() {
            self.working_dir = PathBuf::from(WORKSPACE_PATH)
                .join(&self.working_dir)
                .to_string_lossy()
                .into_owned();
        }
        if is_restricted_volume(&self.working_dir) {
            self.working_dir = WORKSPACE_PATH.to_string();
        }

        let workspace = RuntimeVolume {
            id: self.id.clone(),
            volume: Volume {
                name: WORKSPACE_VOLUME.to_string(),
                empty_dir: Some(Default::default()),
                ..Default::default()
            },
        };
        self.volumes.insert(0, workspace);

        for step in &mut self.steps {
            if step.working_dir.is_empty() {
                step.working_dir = self.working_dir.clone();
            }
            step.volume_mounts.push(VolumeMount {
                name: WORKSPACE_VOLUME.to_string(),
                path: step.working_dir.clone(),
            });
        }
    }

    pub fn step(&self, name: &str) -> Option<&RuntimeStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Merge the given settings into a step's environment (settings win).
    pub fn combine_step_env(&mut self, name: &str, settings: &HashMap<String, String>) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.name == name) {
            for (k, v) in settings {
                step.env.insert(k.clone(), v.clone());
            }
        }
    }
}

impl RuntimeStep {
    /// The step environment plus extra pairs (extras win), as a sorted
    /// `K=V` list for process spawning.
    pub fn env_slice(&self, extra: &HashMap<String, String>) -> Vec<String> {
        let mut merged = self.env.clone();
        for (k, v) in extra {
            merged.insert(k.clone(), v.clone());
        }
        let mut env: Vec<String> = merged.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        env.sort();
        env
    }
}

fn handle(id: u64) -> String {
    format!("ink-{id}")
}

/// True when mounting the path is restricted for untrusted workloads.
pub fn is_restricted_volume(path: &str) -> bool {
    let path = path.to_lowercase();
    let path = path.as_str();
    let restricted = [
        "/", "/etc", "/etc/docker", "/var", "/var/run", "/proc", "/usr/local/bin",
        "/usr/local/sbin", "/usr/bin", "/bin", "/mnt", "/mount", "/media", "/sys", "/dev",
    ];
    restricted
        .iter()
        .any(|r| path == *r || (*r != "/" && path.starts_with(&format!("{r}/"))))
}

#[derive(Debug, Deserialize)]
struct DockerAuths {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Deserialize)]
struct DockerAuth {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Resolve registry credentials for an image from the workflow's image
/// pull secrets (`.dockerconfigjson` payloads). Returns the docker
/// `auth` field form: base64 of `user:password`.
fn registry_auth(pull_secrets: &[&Secret], image: &str) -> String {
    if image.is_empty() {
        return String::new();
    }
    let registry = registry_of(image);
    for secret in pull_secrets {
        let mut secret = (*secret).clone();
        if secret.decrypt().is_err() {
            continue;
        }
        let Some(config) = secret.data.get(SECRET_DOCKER_CONFIG_KEY) else {
            continue;
        };
        let Ok(auths) = serde_json::from_str::<DockerAuths>(config) else {
            continue;
        };
        for (host, auth) in auths.auths {
            if !registry_host_matches(&registry, &host) {
                continue;
            }
            if !auth.auth.is_empty() {
                return auth.auth;
            }
            if !auth.username.is_empty() {
                return BASE64.encode(format!("{}:{}", auth.username, auth.password));
            }
        }
    }
    String::new()
}

/// The registry host of an image reference. A first path segment with a
/// dot, a colon, or the literal `localhost` is a registry; anything else
/// lives on docker hub.
pub fn registry_of(image: &str) -> String {
    let first = image.split('/').next().unwrap_or_default();
    if first.contains('.') || first.contains(':') || first == "localhost" {
        first.to_string()
    } else {
        "docker.io".to_string()
    }
}

fn registry_host_matches(registry: &str, configured: &str) -> bool {
    // the auth address may be a fully qualified url
    let host = configured
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let host = if host == "index.docker.io" { "docker.io" } else { host };
    registry == host
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
