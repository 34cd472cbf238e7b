// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host runtime: steps run as local processes from generated shell
//! scripts under a per-stage scratch directory.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ink_livelog::StreamWriter;

use crate::hook::{Hook, HookError, StepState};
use crate::spec::{RuntimeStep, RuntimeWorkflow};

const SCRIPT_SUFFIX: &str = ".sh";

pub struct HostHook {
    root: PathBuf,
}

impl HostHook {
    pub fn new() -> Self {
        Self::with_root(std::env::temp_dir().join("ink"))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn stage_dir(&self, spec: &RuntimeWorkflow) -> PathBuf {
        self.root.join(&spec.id)
    }

    fn home_dir(&self, spec: &RuntimeWorkflow) -> PathBuf {
        self.stage_dir(spec).join("home")
    }
}

impl Default for HostHook {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the command list as a shell script, echoing each command the
/// way interactive tracing would.
fn script(commands: &[String]) -> String {
    let mut out = String::from("#!/bin/sh\nset -e\n");
    for command in commands {
        out.push_str(&format!("\necho + {command}\n{command}\n"));
    }
    out
}

#[async_trait]
impl Hook for HostHook {
    /// Materialize every step's command list into a script and rewrite
    /// the step to invoke its shell on that script.
    async fn begin(&self, spec: &mut RuntimeWorkflow) -> Result<(), HookError> {
        let script_dir = self.home_dir(spec).join("scripts");
        tokio::fs::create_dir_all(&script_dir).await?;

        for step in &mut spec.steps {
            if step.command.is_empty() {
                continue;
            }
            let (shell, mut args) = if step.shell.is_empty() {
                ("/bin/sh".to_string(), vec!["-e".to_string()])
            } else {
                (step.shell[0].clone(), step.shell[1..].to_vec())
            };

            let path = script_dir.join(format!("{}{SCRIPT_SUFFIX}", step.name));
            tokio::fs::write(&path, script(&step.command)).await?;

            args.push(path.to_string_lossy().into_owned());
            step.command = vec![shell];
            step.args = args;
        }
        Ok(())
    }

    async fn end(&self, spec: &RuntimeWorkflow) -> Result<(), HookError> {
        match tokio::fs::remove_dir_all(self.stage_dir(spec)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn step(
        &self,
        token: &CancellationToken,
        spec: &RuntimeWorkflow,
        step: &RuntimeStep,
        writer: Arc<dyn StreamWriter>,
    ) -> Result<Option<StepState>, HookError> {
        if step.command.is_empty() {
            return Ok(None);
        }

        let home = self.home_dir(spec);
        let working_dir = self.stage_dir(spec).join("rootfs").join(
            step.working_dir.trim_start_matches('/'),
        );
        tokio::fs::create_dir_all(&working_dir).await?;

        let mut extra: std::collections::HashMap<String, String> = [
            ("HOME".to_string(), home.to_string_lossy().into_owned()),
            ("INK_HOME".to_string(), working_dir.to_string_lossy().into_owned()),
            ("INK_WORKSPACE".to_string(), working_dir.to_string_lossy().into_owned()),
        ]
        .into_iter()
        .collect();
        // the process env is rebuilt from scratch; commands still need a
        // search path unless the step pins one
        if !step.env.contains_key("PATH") {
            if let Ok(path) = std::env::var("PATH") {
                extra.insert("PATH".to_string(), path);
            }
        }

        let mut cmd = tokio::process::Command::new(&step.command[0]);
        cmd.args(&step.args)
            .env_clear()
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for pair in step.env_slice(&extra) {
            if let Some((key, value)) = pair.split_once('=') {
                cmd.env(key, value);
            }
        }

        let mut child = cmd.spawn()?;
        debug!(step = %step.name, pid = ?child.id(), "process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_pump = stdout.map(|out| tokio::spawn(pump(out, Arc::clone(&writer))));
        let err_pump = stderr.map(|err| tokio::spawn(pump(err, Arc::clone(&writer))));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = token.cancelled() => {
                let _ = child.start_kill();
                debug!(step = %step.name, "process killed");
                return Err(HookError::Canceled);
            }
        };

        if let Some(pump) = out_pump {
            let _ = pump.await;
        }
        if let Some(pump) = err_pump {
            let _ = pump.await;
        }

        let exit_code = status.code().unwrap_or(255);
        debug!(step = %step.name, exit_code, "process finished");
        Ok(Some(StepState { exit_code, oom_killed: false }))
    }
}

/// Forward one output stream to the writer, line by line.
async fn pump<R>(reader: R, writer: Arc<dyn StreamWriter>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        writer.write(format!("{line}\n").as_bytes());
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
