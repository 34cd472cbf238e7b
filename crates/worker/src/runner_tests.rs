// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use ink_core::{Data, Metadata, Selector, StepTemplate, WorkflowSpec};
use ink_core::{BoxDef, Build, Step};
use ink_livelog::Line;

// ── fakes ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeClient {
    data: Mutex<Option<Data>>,
    accept_conflict: bool,
    /// watch_cancel resolves after this delay; `None` pends forever.
    cancel_after: Option<Duration>,

    calls: Mutex<Vec<String>>,
    stage_ends: Mutex<Vec<Stage>>,
    step_ends: Mutex<Vec<Step>>,
    uploads: Mutex<Vec<(u64, Vec<Line>, bool)>>,
}

impl FakeClient {
    fn with_data(data: Data) -> Arc<Self> {
        Arc::new(Self { data: Mutex::new(Some(data)), ..Default::default() })
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    fn last_stage_end(&self) -> Stage {
        self.stage_ends.lock().last().cloned().expect("a stage end was recorded")
    }
}

#[async_trait]
impl ClientV1 for FakeClient {
    fn name(&self) -> &str {
        "fake.docker.0"
    }

    async fn status(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn request(&self) -> Result<Stage, ClientError> {
        let data = self.data.lock();
        let status = data.as_ref().and_then(|d| d.status.clone());
        status.ok_or(ClientError::Api(ink_core::Error::Canceled))
    }

    async fn accept(&self, _stage_id: u64) -> Result<(), ClientError> {
        self.record("accept");
        if self.accept_conflict {
            return Err(ClientError::Http {
                code: 400,
                message: "stage already assigned. abort".to_string(),
            });
        }
        Ok(())
    }

    async fn info(&self, _stage_id: u64) -> Result<Data, ClientError> {
        self.record("info");
        self.data.lock().clone().ok_or(ClientError::Api(ink_core::Error::NoRecord))
    }

    async fn stage_begin(&self, _stage: &Stage) -> Result<(), ClientError> {
        self.record("stage_begin");
        Ok(())
    }

    async fn stage_end(&self, stage: &Stage) -> Result<(), ClientError> {
        self.record("stage_end");
        self.stage_ends.lock().push(stage.clone());
        Ok(())
    }

    async fn step_begin(&self, _step: &Step) -> Result<(), ClientError> {
        self.record("step_begin");
        Ok(())
    }

    async fn step_end(&self, step: &Step) -> Result<(), ClientError> {
        self.record("step_end");
        self.step_ends.lock().push(step.clone());
        Ok(())
    }

    async fn log_upload(
        &self,
        step_id: u64,
        lines: &[Line],
        all: bool,
    ) -> Result<(), ClientError> {
        self.uploads.lock().push((step_id, lines.to_vec(), all));
        Ok(())
    }

    async fn watch_cancel(&self, _build_id: u64) -> Result<(), ClientError> {
        match self.cancel_after {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[derive(Clone)]
enum StepScript {
    Exit(i32),
    Oom,
    Fail(&'static str),
    /// Echo then exit 0.
    Echo(&'static str),
    /// Run until the token cancels.
    Hang,
}

#[derive(Default)]
struct FakeHook {
    scripts: HashMap<String, StepScript>,
    begin_error: Option<&'static str>,
    begins: Mutex<u32>,
    ends: Mutex<u32>,
}

impl FakeHook {
    fn scripted(scripts: &[(&str, StepScript)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Hook for FakeHook {
    async fn begin(&self, _spec: &mut RuntimeWorkflow) -> Result<(), HookError> {
        *self.begins.lock() += 1;
        match self.begin_error {
            Some(msg) => Err(HookError::Failed(msg.to_string())),
            None => Ok(()),
        }
    }

    async fn end(&self, _spec: &RuntimeWorkflow) -> Result<(), HookError> {
        *self.ends.lock() += 1;
        Ok(())
    }

    async fn step(
        &self,
        token: &CancellationToken,
        _spec: &RuntimeWorkflow,
        step: &crate::spec::RuntimeStep,
        writer: Arc<dyn StreamWriter>,
    ) -> Result<Option<crate::hook::StepState>, HookError> {
        match self.scripts.get(&step.name) {
            None => Ok(None),
            Some(StepScript::Exit(code)) => {
                Ok(Some(crate::hook::StepState { exit_code: *code, oom_killed: false }))
            }
            Some(StepScript::Oom) => {
                Ok(Some(crate::hook::StepState { exit_code: 1, oom_killed: true }))
            }
            Some(StepScript::Fail(msg)) => Err(HookError::Failed(msg.to_string())),
            Some(StepScript::Echo(line)) => {
                writer.write(format!("{line}\n").as_bytes());
                Ok(Some(crate::hook::StepState::default()))
            }
            Some(StepScript::Hang) => {
                token.cancelled().await;
                Err(HookError::Canceled)
            }
        }
    }
}

// ── fixtures ───────────────────────────────────────────────────────────

fn data_for(step_names: &[&str]) -> Data {
    let workflow = Workflow {
        meta: Metadata::new("ci", "build"),
        spec: WorkflowSpec {
            steps: step_names
                .iter()
                .map(|n| StepTemplate { name: n.to_string(), ..Default::default() })
                .collect(),
            ..Default::default()
        },
    };
    let status = Stage {
        id: 10,
        build_id: 5,
        number: 1,
        phase: Phase::Pending,
        name: "build".to_string(),
        steps: step_names
            .iter()
            .enumerate()
            .map(|(k, n)| Step {
                id: 100 + k as u64,
                stage_id: 10,
                number: k as u64 + 1,
                phase: Phase::Pending,
                name: n.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    Data {
        box_def: Some(BoxDef { meta: Metadata::new("ci", "release"), ..Default::default() }),
        build: Some(Build { id: 5, number: 1, phase: Phase::Running, ..Default::default() }),
        workflow: Some(workflow),
        status: Some(status),
        secrets: vec![],
    }
}

async fn run(client: &Arc<FakeClient>, hook: Arc<FakeHook>) -> Result<(), RunError> {
    let token = CancellationToken::new();
    let client_v1: Arc<dyn ClientV1> = Arc::clone(client) as Arc<dyn ClientV1>;
    run_once(&token, client_v1, hook.as_ref()).await
}

fn phases(client: &FakeClient) -> Vec<Phase> {
    client.step_ends.lock().iter().map(|s| s.phase).collect()
}

// ── tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_stage_runs_every_step() {
    let client = FakeClient::with_data(data_for(&["a", "b"]));
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(0)), ("b", StepScript::Exit(0))]);

    run(&client, Arc::clone(&hook)).await.unwrap();

    assert_eq!(phases(&client), vec![Phase::Succeeded, Phase::Succeeded]);
    let stage = client.last_stage_end();
    assert_eq!(stage.phase, Phase::Succeeded);
    assert!(stage.started > 0 && stage.stopped >= stage.started);
    assert_eq!(*hook.begins.lock(), 1);
    assert_eq!(*hook.ends.lock(), 1);

    let calls = client.calls.lock().clone();
    let begin_idx = calls.iter().position(|c| c == "stage_begin").unwrap();
    let accept_idx = calls.iter().position(|c| c == "accept").unwrap();
    assert!(accept_idx < begin_idx);
}

#[tokio::test]
async fn failing_step_skips_the_rest_and_fails_the_stage() {
    let client = FakeClient::with_data(data_for(&["a", "b", "c"]));
    let hook = FakeHook::scripted(&[
        ("a", StepScript::Exit(1)),
        ("b", StepScript::Exit(0)),
        ("c", StepScript::Exit(0)),
    ]);

    run(&client, hook).await.unwrap();

    assert_eq!(phases(&client), vec![Phase::Failed, Phase::Skipped, Phase::Skipped]);
    assert_eq!(client.last_stage_end().phase, Phase::Failed);
    let ends = client.step_ends.lock();
    assert_eq!(ends[0].exit_code, 1);
    // skipped steps never ran
    assert_eq!(ends[1].started, ends[1].stopped);
}

#[tokio::test]
async fn exit_78_marks_the_step_skipped_and_stops_the_pipeline() {
    let client = FakeClient::with_data(data_for(&["a", "b"]));
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(78)), ("b", StepScript::Exit(0))]);

    run(&client, hook).await.unwrap();

    let ends = client.step_ends.lock().clone();
    assert_eq!(ends[0].phase, Phase::Skipped);
    assert_eq!(ends[0].exit_code, 78);
    assert_eq!(ends[1].phase, Phase::Skipped);
    assert_eq!(client.last_stage_end().phase, Phase::Failed);
}

#[tokio::test]
async fn oom_kill_overrides_the_exit_code() {
    let client = FakeClient::with_data(data_for(&["a"]));
    let hook = FakeHook::scripted(&[("a", StepScript::Oom)]);

    run(&client, hook).await.unwrap();

    let ends = client.step_ends.lock().clone();
    assert_eq!(ends[0].exit_code, 137);
    assert_eq!(ends[0].phase, Phase::Failed);
    assert_eq!(client.last_stage_end().phase, Phase::Failed);
}

#[tokio::test]
async fn hook_failure_records_the_error() {
    let client = FakeClient::with_data(data_for(&["a"]));
    let hook = FakeHook::scripted(&[("a", StepScript::Fail("runtime exploded"))]);

    run(&client, hook).await.unwrap();

    let ends = client.step_ends.lock().clone();
    assert_eq!(ends[0].phase, Phase::Failed);
    assert_eq!(ends[0].error, "runtime exploded");
    assert_eq!(client.last_stage_end().phase, Phase::Failed);
}

#[tokio::test]
async fn when_mismatch_skips_the_stage_without_running() {
    let mut data = data_for(&["a"]);
    data.workflow.as_mut().unwrap().spec.when = Some(Selector {
        matches: [("env".to_string(), "prod".to_string())].into_iter().collect(),
        ..Default::default()
    });
    let client = FakeClient::with_data(data);
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(0))]);

    run(&client, Arc::clone(&hook)).await.unwrap();

    let stage = client.last_stage_end();
    assert_eq!(stage.phase, Phase::Skipped);
    for step in &stage.steps {
        assert_eq!(step.phase, Phase::Skipped);
        assert_eq!(step.started, stage.started);
    }
    assert_eq!(*hook.begins.lock(), 0, "the hook never starts");
    assert!(!client.calls.lock().contains(&"stage_begin".to_string()));
}

#[tokio::test]
async fn undecryptable_secret_fails_the_stage_and_skips_steps() {
    let mut data = data_for(&["a"]);
    let mut secret = ink_core::Secret {
        meta: Metadata::new("ci", "broken"),
        ..Default::default()
    };
    secret.encrypt_data.insert("token".to_string(), "!!! not base64 !!!".to_string());
    data.secrets.push(secret);
    let client = FakeClient::with_data(data);
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(0))]);

    run(&client, hook).await.unwrap();

    let stage = client.last_stage_end();
    assert_eq!(stage.phase, Phase::Failed);
    assert!(stage.error.contains("decryption"));
    assert!(stage.steps.iter().all(|s| s.phase == Phase::Skipped));
}

#[tokio::test]
async fn begin_hook_failure_skips_every_step() {
    let client = FakeClient::with_data(data_for(&["a", "b"]));
    let hook = Arc::new(FakeHook {
        scripts: [("a".to_string(), StepScript::Exit(0))].into_iter().collect(),
        begin_error: Some("no network"),
        ..Default::default()
    });

    run(&client, hook).await.unwrap();

    assert_eq!(phases(&client), vec![Phase::Skipped, Phase::Skipped]);
    let stage = client.last_stage_end();
    assert_eq!(stage.phase, Phase::Failed);
    assert_eq!(stage.error, "no network");
}

#[tokio::test]
async fn claim_conflict_aborts_the_iteration_quietly() {
    let data = data_for(&["a"]);
    let client = Arc::new(FakeClient {
        data: Mutex::new(Some(data)),
        accept_conflict: true,
        ..Default::default()
    });
    let hook = FakeHook::scripted(&[]);

    run(&client, hook).await.unwrap();
    assert!(!client.calls.lock().contains(&"info".to_string()));
    assert!(client.stage_ends.lock().is_empty());
}

#[tokio::test]
async fn cancel_broadcast_finalizes_the_stage() {
    let mut fake = FakeClient::default();
    fake.data = Mutex::new(Some(data_for(&["a", "b"])));
    fake.cancel_after = Some(Duration::from_millis(100));
    let client = Arc::new(fake);
    let hook = FakeHook::scripted(&[("a", StepScript::Hang), ("b", StepScript::Exit(0))]);

    let started = std::time::Instant::now();
    run(&client, hook).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let stage = client.last_stage_end();
    assert_eq!(stage.phase, Phase::Canceled);
    assert!(stage.stopped > 0);
    let ends = client.step_ends.lock().clone();
    // the hanging step and the never-started step both end canceled
    assert!(ends.iter().all(|s| s.phase == Phase::Canceled));
    assert_eq!(ends.len(), 2);
}

#[tokio::test]
async fn step_output_is_uploaded_and_masked() {
    let mut data = data_for(&["a"]);
    let mut secret = ink_core::Secret {
        meta: Metadata::new("ci", "token"),
        data: [("value".to_string(), "s3cr3t-value".to_string())].into_iter().collect(),
        ..Default::default()
    };
    secret.encrypt();
    data.secrets.push(secret);

    let client = FakeClient::with_data(data);
    let hook = FakeHook::scripted(&[("a", StepScript::Echo("the token is s3cr3t-value"))]);

    run(&client, hook).await.unwrap();

    let uploads = client.uploads.lock().clone();
    assert!(!uploads.is_empty());
    let all_lines: Vec<&Line> = uploads.iter().flat_map(|(_, lines, _)| lines).collect();
    assert!(all_lines.iter().any(|l| l.content.contains("the token is ******")));
    assert!(all_lines.iter().all(|l| !l.content.contains("s3cr3t-value")));
    // the close-out batch is authoritative
    assert!(uploads.iter().any(|(_, _, all)| *all));
    assert_eq!(client.last_stage_end().phase, Phase::Succeeded);
}

#[tokio::test]
async fn stage_rows_without_template_steps_are_skipped() {
    // the workflow template lost a step the stage still carries
    let mut data = data_for(&["a", "ghost"]);
    data.workflow.as_mut().unwrap().spec.steps.pop();
    let client = FakeClient::with_data(data);
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(0))]);

    run(&client, hook).await.unwrap();
    assert_eq!(phases(&client), vec![Phase::Succeeded, Phase::Skipped]);
    assert_eq!(client.last_stage_end().phase, Phase::Succeeded);
}

#[tokio::test]
async fn template_steps_without_stage_rows_cannot_convert() {
    let mut data = data_for(&["a"]);
    data.status.as_mut().unwrap().steps.clear();
    let client = FakeClient::with_data(data);
    let hook = FakeHook::scripted(&[("a", StepScript::Exit(0))]);

    let err = run(&client, hook).await.unwrap_err();
    assert!(matches!(err, RunError::Convert(_)));
}

#[tokio::test]
async fn hook_returning_none_counts_as_success() {
    let client = FakeClient::with_data(data_for(&["a"]));
    // no script for "a": the hook returns Ok(None)
    let hook = FakeHook::scripted(&[]);

    run(&client, hook).await.unwrap();
    assert_eq!(phases(&client), vec![Phase::Succeeded]);
    assert_eq!(client.last_stage_end().phase, Phase::Succeeded);
}
