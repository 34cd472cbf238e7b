// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime: stage resources and steps managed through the
//! `docker` CLI. Each stage owns a network and a workspace volume; each
//! step runs in a container named after its handle.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ink_core::PullPolicy;
use ink_livelog::StreamWriter;

use crate::hook::{Hook, HookError, StepState};
use crate::spec::{registry_of, RuntimeStep, RuntimeWorkflow};

pub struct DockerHook {
    binary: String,
    config_root: PathBuf,
}

impl DockerHook {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
            config_root: std::env::temp_dir().join("ink-docker"),
        }
    }

    async fn docker(&self, args: &[String]) -> Result<std::process::Output, HookError> {
        debug!(args = ?args, "docker");
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(output)
    }

    async fn docker_ok(&self, args: &[String]) -> Result<(), HookError> {
        let output = self.docker(args).await?;
        if !output.status.success() {
            return Err(HookError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    /// Pull the step image per its policy, using a scoped config dir when
    /// the step carries registry auth.
    async fn pull(&self, step: &RuntimeStep) -> Result<(), HookError> {
        match step.image_pull_policy {
            PullPolicy::Never => return Ok(()),
            PullPolicy::IfNotPresent => {
                let inspect =
                    self.docker(&svec(&["image", "inspect", &step.image])).await?;
                if inspect.status.success() {
                    return Ok(());
                }
            }
            PullPolicy::Always => {}
        }

        let mut args = Vec::new();
        let mut config_dir = None;
        if !step.image_pull_auth.is_empty() {
            let dir = self.config_root.join(&step.id);
            tokio::fs::create_dir_all(&dir).await?;
            let config = serde_json::json!({
                "auths": { registry_of(&step.image): { "auth": step.image_pull_auth } }
            });
            tokio::fs::write(dir.join("config.json"), config.to_string()).await?;
            args.push("--config".to_string());
            args.push(dir.to_string_lossy().into_owned());
            config_dir = Some(dir);
        }
        args.extend(svec(&["pull", &step.image]));

        let result = self.docker_ok(&args).await;
        if let Some(dir) = config_dir {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
        result
    }

    fn run_args(&self, spec: &RuntimeWorkflow, step: &RuntimeStep) -> Vec<String> {
        let mut args = svec(&["run", "--rm", "--name", &step.id, "--network", &spec.id]);
        args.push("-w".to_string());
        args.push(step.working_dir.clone());

        if step.privileged {
            args.push("--privileged".to_string());
        }
        for pair in step.env_slice(&Default::default()) {
            args.push("-e".to_string());
            args.push(pair);
        }
        for dns in &step.dns {
            args.push("--dns".to_string());
            args.push(dns.clone());
        }
        for search in &step.dns_search {
            args.push("--dns-search".to_string());
            args.push(search.clone());
        }
        for host in &step.extra_hosts {
            args.push("--add-host".to_string());
            args.push(host.clone());
        }
        for device in &step.devices {
            args.push("--device".to_string());
            args.push(device.path.clone());
        }
        for mount in &step.volume_mounts {
            let Some(volume) = spec.volumes.iter().find(|v| v.volume.name == mount.name) else {
                continue;
            };
            let source = match &volume.volume.host_path {
                Some(host_path) => host_path.path.clone(),
                // empty-dir volumes become named docker volumes scoped to
                // the stage
                None => format!("{}-{}", spec.id, volume.volume.name),
            };
            args.push("-v".to_string());
            args.push(format!("{source}:{}", mount.path));
        }

        let mut entry = step.entrypoint.clone();
        if !entry.is_empty() {
            args.push("--entrypoint".to_string());
            args.push(entry.remove(0));
        }

        args.push(step.image.clone());
        args.extend(entry);
        args.extend(step.command.iter().cloned());
        args.extend(step.args.iter().cloned());
        args
    }
}

impl Default for DockerHook {
    fn default() -> Self {
        Self::new()
    }
}

fn svec(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[async_trait]
impl Hook for DockerHook {
    async fn begin(&self, spec: &mut RuntimeWorkflow) -> Result<(), HookError> {
        self.docker_ok(&svec(&["network", "create", &spec.id])).await?;
        for volume in &spec.volumes {
            if volume.volume.host_path.is_some() {
                continue;
            }
            let name = format!("{}-{}", spec.id, volume.volume.name);
            self.docker_ok(&svec(&["volume", "create", &name])).await?;
        }
        Ok(())
    }

    async fn end(&self, spec: &RuntimeWorkflow) -> Result<(), HookError> {
        for step in &spec.steps {
            let _ = self.docker(&svec(&["rm", "-f", &step.id])).await;
        }
        for volume in &spec.volumes {
            if volume.volume.host_path.is_some() {
                continue;
            }
            let name = format!("{}-{}", spec.id, volume.volume.name);
            if let Err(e) = self.docker(&svec(&["volume", "rm", "-f", &name])).await {
                warn!(volume = %name, error = %e, "volume teardown failed");
            }
        }
        let _ = self.docker(&svec(&["network", "rm", &spec.id])).await;
        Ok(())
    }

    async fn step(
        &self,
        token: &CancellationToken,
        spec: &RuntimeWorkflow,
        step: &RuntimeStep,
        writer: Arc<dyn StreamWriter>,
    ) -> Result<Option<StepState>, HookError> {
        if step.image.is_empty() {
            return Ok(None);
        }
        self.pull(step).await?;

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(self.run_args(spec, step))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_pump = stdout.map(|out| tokio::spawn(pump(out, Arc::clone(&writer))));
        let err_pump = stderr.map(|err| tokio::spawn(pump(err, Arc::clone(&writer))));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = token.cancelled() => {
                let _ = self.docker(&svec(&["kill", &step.id])).await;
                return Err(HookError::Canceled);
            }
        };

        if let Some(pump) = out_pump {
            let _ = pump.await;
        }
        if let Some(pump) = err_pump {
            let _ = pump.await;
        }

        // `--rm` reaps the container; the process exit code is the
        // container exit code, and 137 signals an OOM kill or SIGKILL
        let exit_code = status.code().unwrap_or(255);
        Ok(Some(StepState { exit_code, oom_killed: false }))
    }
}

async fn pump<R>(reader: R, writer: Arc<dyn StreamWriter>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        writer.write(format!("{line}\n").as_bytes());
    }
}
