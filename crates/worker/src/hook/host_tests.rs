// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use tempfile::tempdir;

#[derive(Default)]
struct Capture {
    data: Mutex<String>,
}

impl StreamWriter for Capture {
    fn write(&self, data: &[u8]) {
        self.data.lock().push_str(&String::from_utf8_lossy(data));
    }

    fn close(&self) {}
}

fn spec_with_command(commands: &[&str]) -> RuntimeWorkflow {
    RuntimeWorkflow {
        id: "ink-1".to_string(),
        name: "build".to_string(),
        namespace: "default".to_string(),
        labels: Default::default(),
        steps: vec![RuntimeStep {
            id: "ink-2".to_string(),
            name: "run".to_string(),
            working_dir: "/ink/src".to_string(),
            command: commands.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }],
        working_dir: "/ink/src".to_string(),
        concurrency: 0,
        volumes: vec![],
        depends_on: vec![],
        worker: Default::default(),
    }
}

#[test]
fn scripts_echo_then_run_each_command() {
    let body = script(&["echo hi".to_string(), "true".to_string()]);
    assert!(body.starts_with("#!/bin/sh\nset -e\n"));
    assert!(body.contains("\necho + echo hi\necho hi\n"));
    assert!(body.contains("\necho + true\ntrue\n"));
}

#[tokio::test]
async fn begin_materializes_scripts_and_rewrites_steps() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let mut spec = spec_with_command(&["echo hi"]);

    hook.begin(&mut spec).await.unwrap();

    let step = &spec.steps[0];
    assert_eq!(step.command, vec!["/bin/sh"]);
    assert_eq!(step.args[0], "-e");
    assert!(step.args[1].ends_with("run.sh"));
    assert!(std::path::Path::new(&step.args[1]).exists());

    hook.end(&spec).await.unwrap();
    assert!(!dir.path().join("ink-1").exists());
    // end is idempotent
    hook.end(&spec).await.unwrap();
}

#[tokio::test]
async fn step_runs_the_script_and_captures_output() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let mut spec = spec_with_command(&["echo hello-from-step"]);
    hook.begin(&mut spec).await.unwrap();

    let capture = Arc::new(Capture::default());
    let token = CancellationToken::new();
    let step = spec.steps[0].clone();
    let state = hook.step(&token, &spec, &step, capture.clone()).await.unwrap().unwrap();

    assert_eq!(state.exit_code, 0);
    assert!(!state.oom_killed);
    let output = capture.data.lock().clone();
    assert!(output.contains("+ echo hello-from-step"));
    assert!(output.contains("hello-from-step\n"));

    hook.end(&spec).await.unwrap();
}

#[tokio::test]
async fn failing_commands_report_their_exit_code() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let mut spec = spec_with_command(&["exit 3"]);
    hook.begin(&mut spec).await.unwrap();

    let token = CancellationToken::new();
    let step = spec.steps[0].clone();
    let state = hook
        .step(&token, &spec, &step, Arc::new(Capture::default()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.exit_code, 3);
}

#[tokio::test]
async fn empty_commands_run_nothing() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let spec = spec_with_command(&[]);
    let token = CancellationToken::new();
    let step = spec.steps[0].clone();
    let state = hook.step(&token, &spec, &step, Arc::new(Capture::default())).await.unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let mut spec = spec_with_command(&["sleep 30"]);
    hook.begin(&mut spec).await.unwrap();

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let step = spec.steps[0].clone();
    let started = std::time::Instant::now();
    let err = hook
        .step(&token, &spec, &step, Arc::new(Capture::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, HookError::Canceled));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn step_env_includes_the_injected_home() {
    let dir = tempdir().unwrap();
    let hook = HostHook::with_root(dir.path());
    let mut spec = spec_with_command(&["echo home=$INK_HOME"]);
    spec.steps[0].env.insert("CUSTOM".to_string(), "yes".to_string());
    spec.steps[0].command.push("echo custom=$CUSTOM".to_string());
    hook.begin(&mut spec).await.unwrap();

    let capture = Arc::new(Capture::default());
    let token = CancellationToken::new();
    let step = spec.steps[0].clone();
    hook.step(&token, &spec, &step, capture.clone()).await.unwrap();

    let output = capture.data.lock().clone();
    assert!(output.contains("home="));
    assert!(output.contains("custom=yes"));
}
