// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: two mount points under one daemon.
//!
//! `/api/core/v1` is the user-facing CRUD and build-control API;
//! `/api/client/v1` is the worker-facing execution API.

mod client;
mod server;
mod sse;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;

use ink_core::Error;

use crate::service::Services;

/// How long a handler may run; long-poll endpoints answer the deadline
/// sentinel on expiry and the client reconnects.
pub(crate) const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub fn router(services: Services) -> Router {
    Router::new()
        .route("/", get(hello))
        .nest("/api/core/v1", server::router())
        .nest("/api/client/v1", client::router())
        .with_state(services)
}

async fn hello(State(_services): State<Services>) -> Json<&'static str> {
    Json("Hello Ink")
}

/// Error responses carry the message as a single quoted JSON string so
/// clients can map sentinels back onto typed errors.
pub(crate) struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Internal(_) | Error::DeadlineExceeded | Error::ContextCanceled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(self.0.to_string())).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn sentinels_map_to_bad_request_with_quoted_bodies() {
        let response = ApiError(Error::NoRecord).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError(Error::internal("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError(Error::DeadlineExceeded).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
