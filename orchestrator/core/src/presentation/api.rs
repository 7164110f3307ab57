// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JSON-over-HTTP binding for the [`OperationDispatcher`].
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | liveness and operation count |
//! | `GET /v1/operations` | operation descriptors (name, description, scopes, schema) |
//! | `POST /v1/operations/{name}` | invoke with `Authorization: Bearer <identity token>` |
//!
//! Each request runs under a child of the server's shutdown token, so a
//! graceful shutdown cancels in-flight operations and their pending grant
//! exchanges. A client disconnect drops the handler future, which has the
//! same effect.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::application::dispatcher::{DispatchError, OperationDispatcher};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<OperationDispatcher>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<OperationDispatcher>, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/operations", get(list_operations_handler))
        .route("/v1/operations/{name}", post(invoke_operation_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "operations": state.dispatcher.registry().len(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn list_operations_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "operations": state.dispatcher.registry().descriptors() }))
}

async fn invoke_operation_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_arguments",
                    format!("Request body is not valid JSON: {}", e),
                )
            }
        }
    };

    let outcome = state
        .dispatcher
        .dispatch(
            &name,
            bearer_token(&headers),
            arguments,
            state.shutdown.child_token(),
        )
        .await;

    match outcome {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            let (status, kind) = status_for(&e);
            error_response(status, kind, e.to_string())
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

fn status_for(error: &DispatchError) -> (StatusCode, &'static str) {
    match error {
        DispatchError::UnknownOperation(_) => (StatusCode::NOT_FOUND, "unknown_operation"),
        DispatchError::InvalidArguments(_) => (StatusCode::BAD_REQUEST, "invalid_arguments"),
        DispatchError::InvalidIdentity(_) => (StatusCode::UNAUTHORIZED, "invalid_identity"),
        DispatchError::TimedOut(_) => (StatusCode::GATEWAY_TIMEOUT, "timed_out"),
        DispatchError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
        DispatchError::OperationFault(_) => (StatusCode::INTERNAL_SERVER_ERROR, "operation_fault"),
    }
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": message,
            "kind": kind,
            "isError": true,
        })),
    )
        .into_response()
}
