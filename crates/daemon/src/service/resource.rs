// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource CRUD and apply (upsert) semantics.
//!
//! Writes normalize a blank namespace to `default`, stamp the kind and
//! creation timestamp, and validate what can be validated without running
//! anything: selector grammars and the box dependency DAG.

use ink_core::{
    BoxDef, Error, Secret, Workflow, KIND_BOX, KIND_SECRET, KIND_WORKFLOW,
};
use serde_json::Value;

use super::{normalize_namespace, Services};

/// A manifest object, as submitted by `apply`/`exec`.
#[derive(Debug, Clone)]
pub enum Object {
    Secret(Secret),
    Workflow(Workflow),
    BoxDef(BoxDef),
}

impl Object {
    /// Decode one manifest document by its `kind` field.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
        let decode_err = |e: serde_json::Error| Error::invalid(format!("decode {kind}: {e}"));
        match kind.as_str() {
            KIND_SECRET => Ok(Object::Secret(serde_json::from_value(value).map_err(decode_err)?)),
            KIND_WORKFLOW => {
                Ok(Object::Workflow(serde_json::from_value(value).map_err(decode_err)?))
            }
            KIND_BOX => Ok(Object::BoxDef(serde_json::from_value(value).map_err(decode_err)?)),
            "" => Err(Error::invalid("manifest is missing a kind")),
            other => Err(Error::invalid(format!("unsupported kind: {other}"))),
        }
    }

    /// Apply ordering within one batch: secrets, workflows, boxes.
    pub fn order(&self) -> u8 {
        match self {
            Object::Secret(_) => 0,
            Object::Workflow(_) => 1,
            Object::BoxDef(_) => 2,
        }
    }
}

pub async fn secret_create(services: &Services, mut data: Secret) -> Result<Secret, Error> {
    prepare_meta(services, &mut data.meta, KIND_SECRET);
    data.encrypt();
    services.store.secret_create(&mut data).await?;
    Ok(data)
}

pub async fn secret_update(services: &Services, mut data: Secret) -> Result<Secret, Error> {
    prepare_meta(services, &mut data.meta, KIND_SECRET);
    data.encrypt();
    services.store.secret_update(&data).await?;
    Ok(data)
}

pub async fn workflow_create(services: &Services, mut data: Workflow) -> Result<Workflow, Error> {
    prepare_meta(services, &mut data.meta, KIND_WORKFLOW);
    validate_workflow(&data)?;
    services.store.workflow_create(&mut data).await?;
    Ok(data)
}

pub async fn workflow_update(services: &Services, mut data: Workflow) -> Result<Workflow, Error> {
    prepare_meta(services, &mut data.meta, KIND_WORKFLOW);
    validate_workflow(&data)?;
    services.store.workflow_update(&data).await?;
    Ok(data)
}

pub async fn box_create(services: &Services, mut data: BoxDef) -> Result<BoxDef, Error> {
    prepare_meta(services, &mut data.meta, KIND_BOX);
    validate_box(services, &data).await?;
    services.store.box_create(&mut data).await?;
    Ok(data)
}

pub async fn box_update(services: &Services, mut data: BoxDef) -> Result<BoxDef, Error> {
    prepare_meta(services, &mut data.meta, KIND_BOX);
    validate_box(services, &data).await?;
    services.store.box_update(&data).await?;
    Ok(data)
}

/// Upsert a batch of manifests in kind order.
pub async fn apply(services: &Services, mut objects: Vec<Object>) -> Result<(), Error> {
    objects.sort_by_key(Object::order);
    for object in objects {
        match object {
            Object::Secret(data) => {
                let exists = services
                    .store
                    .secret_info(data.meta.namespace(), &data.meta.name)
                    .await
                    .is_ok();
                if exists {
                    secret_update(services, data).await?;
                } else {
                    secret_create(services, data).await?;
                }
            }
            Object::Workflow(data) => {
                let exists = services
                    .store
                    .workflow_info(data.meta.namespace(), &data.meta.name)
                    .await
                    .is_ok();
                if exists {
                    workflow_update(services, data).await?;
                } else {
                    workflow_create(services, data).await?;
                }
            }
            Object::BoxDef(data) => {
                let exists =
                    services.store.box_info(data.meta.namespace(), &data.meta.name).await.is_ok();
                if exists {
                    box_update(services, data).await?;
                } else {
                    box_create(services, data).await?;
                }
            }
        }
    }
    Ok(())
}

fn prepare_meta(services: &Services, meta: &mut ink_core::Metadata, kind: &str) {
    meta.kind = kind.to_string();
    meta.namespace = normalize_namespace(&meta.namespace).to_string();
    if meta.creation == 0 {
        meta.creation = services.now();
    }
}

fn validate_workflow(data: &Workflow) -> Result<(), Error> {
    if data.meta.name.is_empty() {
        return Err(Error::invalid("workflow name must be defined"));
    }
    if let Some(when) = &data.spec.when {
        when.validate()?;
    }
    let mut seen = std::collections::HashSet::new();
    for step in &data.spec.steps {
        if step.name.is_empty() {
            return Err(Error::invalid("step name must be defined"));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(Error::invalid(format!("duplicate step name: {}", step.name)));
        }
    }
    Ok(())
}

/// Validate a box against the workflows it selects (wildcard selects the
/// whole namespace), including the dependency cycle check.
async fn validate_box(services: &Services, data: &BoxDef) -> Result<(), Error> {
    if data.meta.name.is_empty() {
        return Err(Error::invalid("box name must be defined"));
    }
    let workflows = selected_workflows(services, data, &data.settings).await?;
    data.validate(&workflows)
}

/// Load the workflows a box's resource entries select under `settings`.
pub async fn selected_workflows(
    services: &Services,
    box_def: &BoxDef,
    settings: &std::collections::HashMap<String, String>,
) -> Result<Vec<Workflow>, Error> {
    let (names, selectors) = box_def.selectors(KIND_WORKFLOW, settings);
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let wildcard = names.iter().any(String::is_empty);

    let all = services.store.workflow_list(box_def.meta.namespace()).await?;
    Ok(all
        .into_iter()
        .filter(|wf| {
            if wildcard {
                // wildcard expansion honors the disable label unless the
                // workflow is also named explicitly
                if wf.meta.is_disabled() && !names.contains(&wf.meta.name) {
                    return false;
                }
            } else if !names.contains(&wf.meta.name) {
                return false;
            }
            selectors.is_empty() || selectors.iter().any(|s| s.matches(&wf.meta.labels))
        })
        .collect())
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
