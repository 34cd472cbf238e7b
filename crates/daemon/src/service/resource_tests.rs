// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::service::test_services;
use ink_core::{BoxResource, Metadata, Selector, StepTemplate, WorkflowSpec};

fn secret(name: &str) -> Secret {
    Secret {
        meta: Metadata::new("", name),
        data: [("token".to_string(), "t0ps3cret".to_string())].into_iter().collect(),
        ..Default::default()
    }
}

fn workflow(name: &str, deps: &[&str]) -> Workflow {
    Workflow {
        meta: Metadata::new("", name),
        spec: WorkflowSpec {
            steps: vec![StepTemplate { name: "run".to_string(), ..Default::default() }],
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

#[tokio::test]
async fn secret_writes_encrypt_and_clear_plaintext() {
    let services = test_services();
    let created = secret_create(&services, secret("registry")).await.unwrap();

    assert!(created.data.is_empty());
    assert!(created.encrypt_data.contains_key("token"));
    assert_eq!(created.meta.kind, ink_core::KIND_SECRET);
    assert_eq!(created.meta.namespace, "default");
    assert!(created.meta.creation > 0);
}

#[tokio::test]
async fn workflow_validation_rejects_duplicate_steps() {
    let services = test_services();
    let mut wf = workflow("build", &[]);
    wf.spec.steps.push(StepTemplate { name: "run".to_string(), ..Default::default() });
    let err = workflow_create(&services, wf).await.unwrap_err();
    assert!(err.to_string().contains("duplicate step name"));
}

#[tokio::test]
async fn box_create_rejects_a_dependency_cycle() {
    let services = test_services();
    workflow_create(&services, workflow("a", &["b"])).await.unwrap();
    workflow_create(&services, workflow("b", &["a"])).await.unwrap();

    let err = box_create(&services, box_over(&["a", "b"])).await.unwrap_err();
    assert_eq!(err.to_string(), "dependency cycle detected in workflows");
}

#[tokio::test]
async fn box_create_accepts_an_acyclic_bundle() {
    let services = test_services();
    workflow_create(&services, workflow("a", &[])).await.unwrap();
    workflow_create(&services, workflow("b", &["a"])).await.unwrap();

    box_create(&services, box_over(&["a", "b"])).await.unwrap();
    let loaded = services.store.box_info("default", "release").await.unwrap();
    assert_eq!(loaded.meta.kind, ink_core::KIND_BOX);
}

#[tokio::test]
async fn box_update_revalidates_the_graph() {
    let services = test_services();
    workflow_create(&services, workflow("a", &[])).await.unwrap();
    box_create(&services, box_over(&["a"])).await.unwrap();

    // introduce a self-cycle, then try to re-point the box at it
    workflow_update(&services, workflow("a", &["a"])).await.unwrap();
    let err = box_update(&services, box_over(&["a"])).await.unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[tokio::test]
async fn apply_twice_leaves_state_identical() {
    let services = test_services();
    let objects = vec![
        Object::BoxDef(box_over(&["build"])),
        Object::Workflow(workflow("build", &[])),
        Object::Secret(secret("registry")),
    ];

    apply(&services, objects.clone()).await.unwrap();
    let first_wf = services.store.workflow_info("default", "build").await.unwrap();
    let first_secret = services.store.secret_info("default", "registry").await.unwrap();

    apply(&services, objects).await.unwrap();
    let second_wf = services.store.workflow_info("default", "build").await.unwrap();
    let second_secret = services.store.secret_info("default", "registry").await.unwrap();

    assert_eq!(first_wf, second_wf);
    assert_eq!(first_secret.meta.id, second_secret.meta.id);
    assert_eq!(first_secret.encrypt_data, second_secret.encrypt_data);
}

#[tokio::test]
async fn selected_workflows_honor_label_selectors() {
    let services = test_services();
    for (name, env) in [("x", "prod"), ("y", "dev"), ("z", "prod")] {
        let mut wf = workflow(name, &[]);
        wf.meta.labels.insert("env".to_string(), env.to_string());
        workflow_create(&services, wf).await.unwrap();
    }

    let box_def = BoxDef {
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

    let selected = selected_workflows(&services, &box_def, &Default::default()).await.unwrap();
    let mut names: Vec<&str> = selected.iter().map(|w| w.meta.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["x", "z"]);
}

#[tokio::test]
async fn wildcard_expansion_skips_disabled_workflows() {
    let services = test_services();
    workflow_create(&services, workflow("on", &[])).await.unwrap();
    let mut off = workflow("off", &[]);
    off.meta
        .labels
        .insert(ink_core::meta::LABEL_STATUS.to_string(), ink_core::meta::STATUS_DISABLE.to_string());
    workflow_create(&services, off).await.unwrap();

    let box_def = BoxDef {
        meta: Metadata::new("", "release"),
        resources: vec![BoxResource {
            kind: ink_core::KIND_WORKFLOW.to_string(),
            when: Some(Selector::default()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let selected = selected_workflows(&services, &box_def, &Default::default()).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].meta.name, "on");
}

#[tokio::test]
async fn manifest_objects_decode_by_kind() {
    let doc = serde_json::json!({
        "kind": "Workflow",
        "name": "build",
        "spec": { "steps": [ { "name": "run" } ] }
    });
    assert!(matches!(Object::from_value(doc).unwrap(), Object::Workflow(_)));

    let missing = serde_json::json!({ "name": "x" });
    assert!(Object::from_value(missing).is_err());

    let unknown = serde_json::json!({ "kind": "Gadget", "name": "x" });
    assert!(Object::from_value(unknown).is_err());
}
