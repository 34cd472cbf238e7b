// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::service::resource::{box_create, workflow_create};
use crate::service::test_services;
use ink_core::{BoxDef, BoxResource, Metadata, Selector, StepTemplate, Workflow, WorkflowSpec};

fn workflow(name: &str, deps: &[&str]) -> Workflow {
    Workflow {
        meta: Metadata::new("", name),
        spec: WorkflowSpec {
            steps: vec![
                StepTemplate { name: "prepare".to_string(), ..Default::default() },
                StepTemplate { name: "run".to_string(), ..Default::default() },
            ],
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        },
    }
}

fn box_over(names: &[&str]) -> BoxDef {
    BoxDef {
        meta: Metadata::new("", "release"),
        resources: names
            .iter()
            .map(|n| BoxResource {
                kind: ink_core::KIND_WORKFLOW.to_string(),
                name: n.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

async fn seed(services: &Services, workflows: Vec<Workflow>, box_def: BoxDef) {
    for wf in workflows {
        workflow_create(services, wf).await.unwrap();
    }
    box_create(services, box_def).await.unwrap();
}

#[tokio::test]
async fn create_materializes_stages_and_steps() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[]), workflow("b", &[])], box_over(&["a", "b"])).await;

    let number = create(&services, "", "release", HashMap::new()).await.unwrap();
    assert_eq!(number, 1);

    let build = info(&services, "", "release", 1).await.unwrap();
    assert_eq!(build.phase, Phase::Pending);
    assert_eq!(build.stages.len(), 2);
    for (k, stage) in build.stages.iter().enumerate() {
        assert_eq!(stage.number, k as u64 + 1);
        assert_eq!(stage.phase, Phase::Pending);
        assert_eq!(stage.steps.len(), 2);
        assert_eq!(stage.steps[0].number, 1);
        assert_eq!(stage.steps[1].number, 2);
    }
}

#[tokio::test]
async fn build_numbers_increment_per_box() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[])], box_over(&["a"])).await;

    assert_eq!(create(&services, "", "release", HashMap::new()).await.unwrap(), 1);
    assert_eq!(create(&services, "", "release", HashMap::new()).await.unwrap(), 2);
    assert_eq!(create(&services, "", "release", HashMap::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn dependent_stages_start_waiting() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[]), workflow("b", &["a"])], box_over(&["a", "b"])).await;

    create(&services, "", "release", HashMap::new()).await.unwrap();
    let build = info(&services, "", "release", 1).await.unwrap();
    assert_eq!(build.stages[0].phase, Phase::Pending);
    assert_eq!(build.stages[1].phase, Phase::Waiting);
    assert!(build.stages[1].steps.iter().all(|s| s.phase == Phase::Waiting));
}

#[tokio::test]
async fn no_matching_workflow_inserts_nothing() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[])], box_over(&["missing"])).await;

    let err = create(&services, "", "release", HashMap::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "no workflow matched");

    let mut page = Pagination::new(1, 10);
    let builds = list(&services, "", "release", &mut page).await.unwrap();
    assert!(builds.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn box_without_workflow_resources_errors() {
    let services = test_services();
    workflow_create(&services, workflow("a", &[])).await.unwrap();
    let b = BoxDef {
        meta: Metadata::new("", "release"),
        resources: vec![BoxResource {
            kind: ink_core::KIND_SECRET.to_string(),
            name: "registry".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };
    box_create(&services, b).await.unwrap();

    let err = create(&services, "", "release", HashMap::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "workflow resource not found");
}

#[tokio::test]
async fn label_selector_expansion_creates_matching_stages_only() {
    let services = test_services();
    for (name, env) in [("x", "prod"), ("y", "dev"), ("z", "prod")] {
        let mut wf = workflow(name, &[]);
        wf.meta.labels.insert("env".to_string(), env.to_string());
        workflow_create(&services, wf).await.unwrap();
    }
    let b = BoxDef {
        meta: Metadata::new("", "release"),
        resources: vec![BoxResource {
            kind: ink_core::KIND_WORKFLOW.to_string(),
            label_selector: Some(Selector {
                operations: vec![ink_core::Operation {
                    key: "env".to_string(),
                    operator: ink_core::Operator::In,
                    values: vec!["prod".to_string()],
                }],
                ..Default::default()
            }),
            ..Default::default()
        }],
        ..Default::default()
    };
    box_create(&services, b).await.unwrap();

    create(&services, "", "release", HashMap::new()).await.unwrap();
    let build = info(&services, "", "release", 1).await.unwrap();
    let mut names: Vec<&str> = build.stages.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["x", "z"]);
}

#[tokio::test]
async fn when_gate_skips_stages_at_creation() {
    let services = test_services();
    let mut gated = workflow("gated", &[]);
    gated.spec.when = Some(Selector {
        matches: [("env".to_string(), "prod".to_string())].into_iter().collect(),
        ..Default::default()
    });
    seed(&services, vec![workflow("plain", &[]), gated], box_over(&["plain", "gated"])).await;

    let settings: HashMap<String, String> =
        [("env".to_string(), "dev".to_string())].into_iter().collect();
    create(&services, "", "release", settings).await.unwrap();

    let build = info(&services, "", "release", 1).await.unwrap();
    let gated_stage = build.stages.iter().find(|s| s.name == "gated").unwrap();
    assert_eq!(gated_stage.phase, Phase::Skipped);
    assert!(gated_stage.steps.iter().all(|s| s.phase == Phase::Skipped));
}

#[tokio::test]
async fn skipped_dependency_resolves_waiters_at_creation() {
    let services = test_services();
    let mut gated = workflow("gated", &[]);
    gated.spec.when = Some(Selector {
        matches: [("env".to_string(), "prod".to_string())].into_iter().collect(),
        ..Default::default()
    });
    seed(
        &services,
        vec![gated, workflow("after", &["gated"])],
        box_over(&["gated", "after"]),
    )
    .await;

    create(&services, "", "release", HashMap::new()).await.unwrap();
    let build = info(&services, "", "release", 1).await.unwrap();

    // the dependent cannot run: its dependency was skipped at creation
    let after = build.stages.iter().find(|s| s.name == "after").unwrap();
    assert_eq!(after.phase, Phase::Skipped);
    // with every stage terminal the build closes immediately
    assert_eq!(build.phase, Phase::Succeeded);
    assert!(build.stopped > 0);
}

#[tokio::test]
async fn cancel_marks_pending_rows_and_errors_when_done() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[])], box_over(&["a"])).await;
    create(&services, "", "release", HashMap::new()).await.unwrap();

    cancel(&services, "", "release", 1).await.unwrap();
    let build = info(&services, "", "release", 1).await.unwrap();
    assert_eq!(build.phase, Phase::Canceled);
    assert_eq!(build.stages[0].phase, Phase::Canceled);
    assert!(build.stages[0].steps.iter().all(|s| s.phase == Phase::Canceled));

    let err = cancel(&services, "", "release", 1).await.unwrap_err();
    assert_eq!(err, Error::AlreadyDone);
}

#[tokio::test]
async fn cancel_resolves_waiting_dependents() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[]), workflow("b", &["a"])], box_over(&["a", "b"])).await;
    create(&services, "", "release", HashMap::new()).await.unwrap();

    cancel(&services, "", "release", 1).await.unwrap();
    let build = info(&services, "", "release", 1).await.unwrap();

    let a = build.stages.iter().find(|s| s.name == "a").unwrap();
    let b = build.stages.iter().find(|s| s.name == "b").unwrap();
    assert_eq!(a.phase, Phase::Canceled);
    assert_eq!(b.phase, Phase::Skipped);
    assert_eq!(build.phase, Phase::Canceled);
}

#[tokio::test]
async fn list_pages_newest_first() {
    let services = test_services();
    seed(&services, vec![workflow("a", &[])], box_over(&["a"])).await;
    for _ in 0..12 {
        create(&services, "", "release", HashMap::new()).await.unwrap();
    }

    let mut page = Pagination::new(1, 10);
    let builds = list(&services, "", "release", &mut page).await.unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(builds.len(), 10);
    assert_eq!(builds[0].number, 12);
}

#[tokio::test]
async fn unknown_box_is_no_record() {
    let services = test_services();
    let err = create(&services, "", "ghost", HashMap::new()).await.unwrap_err();
    assert_eq!(err, Error::NoRecord);
}
