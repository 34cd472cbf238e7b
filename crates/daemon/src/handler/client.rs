// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing execution handlers (`/api/client/v1`).
//!
//! The two long-poll endpoints (stage request, cancel watch) race the
//! work against [`HTTP_TIMEOUT`] and answer the deadline sentinel on
//! expiry; workers treat that as "reconnect".

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;

use ink_core::{Data, Error, Stage, Step, WorkerDescriptor};
use ink_livelog::Line;

use super::{ApiError, ApiResult, HTTP_TIMEOUT};
use crate::service::{stage, Services};

pub fn router() -> Router<Services> {
    Router::new()
        .route("/status", post(status))
        .route("/stage", post(request))
        .route("/stage/{stage}", post(accept).get(info))
        .route("/stage/{stage}/begin", post(stage_begin))
        .route("/stage/{stage}/end", post(stage_end))
        .route("/step/{step}/begin", post(step_begin))
        .route("/step/{step}/end", post(step_end))
        .route("/step/{step}/logs/upload", post(log_upload))
        .route("/build/{build}/watch", post(watch_cancel))
}

async fn status() -> Json<&'static str> {
    Json("ok")
}

/// Long-poll: block until the queue dispatches a matching stage.
async fn request(
    State(services): State<Services>,
    Json(worker): Json<WorkerDescriptor>,
) -> ApiResult<Json<Stage>> {
    match tokio::time::timeout(HTTP_TIMEOUT, services.sched.request(worker)).await {
        Ok(result) => Ok(Json(result?)),
        Err(_) => Err(ApiError(Error::DeadlineExceeded)),
    }
}

#[derive(Debug, Deserialize)]
struct AcceptQuery {
    #[serde(default)]
    name: String,
}

async fn accept(
    State(services): State<Services>,
    Path(stage_id): Path<u64>,
    Query(query): Query<AcceptQuery>,
) -> ApiResult<Json<&'static str>> {
    stage::accept(&services, stage_id, &query.name).await?;
    Ok(Json("ok"))
}

async fn info(
    State(services): State<Services>,
    Path(stage_id): Path<u64>,
) -> ApiResult<Json<Data>> {
    Ok(Json(stage::info(&services, stage_id).await?))
}

async fn stage_begin(
    State(services): State<Services>,
    Path(_stage_id): Path<u64>,
    Json(data): Json<Stage>,
) -> ApiResult<Json<&'static str>> {
    stage::begin(&services, data).await?;
    Ok(Json("ok"))
}

async fn stage_end(
    State(services): State<Services>,
    Path(_stage_id): Path<u64>,
    Json(data): Json<Stage>,
) -> ApiResult<Json<&'static str>> {
    stage::end(&services, data).await?;
    Ok(Json("ok"))
}

async fn step_begin(
    State(services): State<Services>,
    Path(_step_id): Path<u64>,
    Json(data): Json<Step>,
) -> ApiResult<Json<Step>> {
    Ok(Json(stage::step_begin(&services, data).await?))
}

async fn step_end(
    State(services): State<Services>,
    Path(_step_id): Path<u64>,
    Json(data): Json<Step>,
) -> ApiResult<Json<Step>> {
    Ok(Json(stage::step_end(&services, data).await?))
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    all: bool,
}

async fn log_upload(
    State(services): State<Services>,
    Path(step_id): Path<u64>,
    Query(query): Query<UploadQuery>,
    Json(lines): Json<Vec<Line>>,
) -> ApiResult<Json<&'static str>> {
    stage::log_upload(&services, step_id, lines, query.all).await?;
    Ok(Json("ok"))
}

/// Long-poll: 200 once the build is canceled, deadline sentinel on
/// timeout (the worker reconnects and keeps watching).
async fn watch_cancel(
    State(services): State<Services>,
    Path(build_id): Path<u64>,
) -> ApiResult<Json<&'static str>> {
    match tokio::time::timeout(HTTP_TIMEOUT, services.sched.canceled(build_id)).await {
        Ok(_) => Ok(Json("ok")),
        Err(_) => Err(ApiError(Error::DeadlineExceeded)),
    }
}
