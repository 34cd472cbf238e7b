// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing CRUD and build-control handlers (`/api/core/v1`).

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use ink_core::{BoxDef, Build, Error, Pagination, Secret, Workflow};

use super::{sse, ApiError, ApiResult};
use crate::service::{build, resource, Services};

pub fn router() -> Router<Services> {
    Router::new()
        .route("/secret", get(secret_list_all).post(secret_create))
        .route("/secret/{namespace}", get(secret_list))
        .route(
            "/secret/{namespace}/{name}",
            get(secret_info).put(secret_update).delete(secret_delete),
        )
        .route("/workflow", get(workflow_list_all).post(workflow_create))
        .route("/workflow/{namespace}", get(workflow_list))
        .route(
            "/workflow/{namespace}/{name}",
            get(workflow_info).put(workflow_update).delete(workflow_delete),
        )
        .route("/box", get(box_list_all).post(box_create))
        .route("/box/{namespace}", get(box_list))
        .route("/box/{namespace}/{name}", get(box_info).put(box_update).delete(box_delete))
        .route(
            "/box/{namespace}/{name}/build",
            get(build_list).post(build_create),
        )
        .route("/box/{namespace}/{name}/build/{number}", get(build_info))
        .route("/box/{namespace}/{name}/build/{number}/cancel", post(build_cancel))
        .route(
            "/box/{namespace}/{name}/build/{number}/logs/{stage}/{step}",
            get(log_info).post(log_watch),
        )
}

// ── secrets ────────────────────────────────────────────────────────────

async fn secret_list_all(State(services): State<Services>) -> ApiResult<Json<Vec<Secret>>> {
    Ok(Json(services.store.secret_list("").await?))
}

async fn secret_list(
    State(services): State<Services>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<Secret>>> {
    Ok(Json(services.store.secret_list(&namespace).await?))
}

async fn secret_info(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Secret>> {
    Ok(Json(services.store.secret_info(&namespace, &name).await?))
}

async fn secret_create(
    State(services): State<Services>,
    Json(data): Json<Secret>,
) -> ApiResult<Json<Secret>> {
    Ok(Json(resource::secret_create(&services, data).await?))
}

async fn secret_update(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
    Json(mut data): Json<Secret>,
) -> ApiResult<Json<Secret>> {
    data.meta.namespace = namespace;
    data.meta.name = name;
    Ok(Json(resource::secret_update(&services, data).await?))
}

async fn secret_delete(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<&'static str>> {
    services.store.secret_delete(&namespace, &name).await?;
    Ok(Json("ok"))
}

// ── workflows ──────────────────────────────────────────────────────────

async fn workflow_list_all(State(services): State<Services>) -> ApiResult<Json<Vec<Workflow>>> {
    Ok(Json(services.store.workflow_list("").await?))
}

async fn workflow_list(
    State(services): State<Services>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<Workflow>>> {
    Ok(Json(services.store.workflow_list(&namespace).await?))
}

async fn workflow_info(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(services.store.workflow_info(&namespace, &name).await?))
}

async fn workflow_create(
    State(services): State<Services>,
    Json(data): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(resource::workflow_create(&services, data).await?))
}

async fn workflow_update(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
    Json(mut data): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    data.meta.namespace = namespace;
    data.meta.name = name;
    Ok(Json(resource::workflow_update(&services, data).await?))
}

async fn workflow_delete(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<&'static str>> {
    services.store.workflow_delete(&namespace, &name).await?;
    Ok(Json("ok"))
}

// ── boxes ──────────────────────────────────────────────────────────────

async fn box_list_all(State(services): State<Services>) -> ApiResult<Json<Vec<BoxDef>>> {
    Ok(Json(services.store.box_list("").await?))
}

async fn box_list(
    State(services): State<Services>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<BoxDef>>> {
    Ok(Json(services.store.box_list(&namespace).await?))
}

async fn box_info(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<BoxDef>> {
    Ok(Json(services.store.box_info(&namespace, &name).await?))
}

async fn box_create(
    State(services): State<Services>,
    Json(data): Json<BoxDef>,
) -> ApiResult<Json<BoxDef>> {
    Ok(Json(resource::box_create(&services, data).await?))
}

async fn box_update(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
    Json(mut data): Json<BoxDef>,
) -> ApiResult<Json<BoxDef>> {
    data.meta.namespace = namespace;
    data.meta.name = name;
    Ok(Json(resource::box_update(&services, data).await?))
}

async fn box_delete(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<&'static str>> {
    services.store.box_delete(&namespace, &name).await?;
    Ok(Json("ok"))
}

// ── builds ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u64>,
    size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PageResult<T> {
    page: u64,
    size: u64,
    total: u64,
    items: Vec<T>,
}

async fn build_list(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PageResult<Build>>> {
    let mut page = Pagination::new(query.page.unwrap_or(0), query.size.unwrap_or(0));
    let items = build::list(&services, &namespace, &name, &mut page).await?;
    Ok(Json(PageResult { page: page.page, size: page.size, total: page.total, items }))
}

async fn build_create(
    State(services): State<Services>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Json<HashMap<String, String>>>,
) -> ApiResult<Json<u64>> {
    // query params overlay the body settings
    let mut settings = body.map(|Json(b)| b).unwrap_or_default();
    settings.extend(query);
    let number = build::create(&services, &namespace, &name, settings).await?;
    Ok(Json(number))
}

async fn build_info(
    State(services): State<Services>,
    Path((namespace, name, number)): Path<(String, String, u64)>,
) -> ApiResult<Json<Build>> {
    Ok(Json(build::info(&services, &namespace, &name, number).await?))
}

async fn build_cancel(
    State(services): State<Services>,
    Path((namespace, name, number)): Path<(String, String, u64)>,
) -> ApiResult<Json<&'static str>> {
    build::cancel(&services, &namespace, &name, number).await?;
    Ok(Json("ok"))
}

// ── logs ───────────────────────────────────────────────────────────────

/// Resolve `(namespace, box, build number, stage number, step number)` to
/// the step id.
async fn resolve_step(
    services: &Services,
    namespace: &str,
    name: &str,
    number: u64,
    stage_number: u64,
    step_number: u64,
) -> Result<u64, Error> {
    let build = build::info(services, namespace, name, number).await?;
    let stage = build
        .stages
        .iter()
        .find(|s| s.number == stage_number)
        .ok_or(Error::NoRecord)?;
    let step =
        stage.steps.iter().find(|s| s.number == step_number).ok_or(Error::NoRecord)?;
    Ok(step.id)
}

/// The persisted log of a finished step: the stored JSON array verbatim,
/// or an empty array when nothing has been persisted yet.
async fn log_info(
    State(services): State<Services>,
    Path((namespace, name, number, stage, step)): Path<(String, String, u64, u64, u64)>,
) -> ApiResult<Response> {
    let step_id = resolve_step(&services, &namespace, &name, number, stage, step).await?;
    let data = match services.store.log_info(step_id).await {
        Ok(data) => data,
        Err(Error::NoRecord) => b"[]".to_vec(),
        Err(e) => return Err(ApiError(e)),
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], data).into_response())
}

/// Upgrade to a server-sent-event stream of live log lines.
async fn log_watch(
    State(services): State<Services>,
    Path((namespace, name, number, stage, step)): Path<(String, String, u64, u64, u64)>,
) -> ApiResult<Response> {
    let step_id = resolve_step(&services, &namespace, &name, number, stage, step).await?;
    Ok(sse::stream(services, step_id))
}
