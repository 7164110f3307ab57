// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Built-in Operations
//!
//! Tracker (GraphQL) and repository-host (REST) operations, diagnostics and
//! the research pipeline entry point, registered under their public names.
//!
//! Every privileged operation follows the same shape:
//!
//! 1. If the request has any authorization gap, return
//!    `{"error": "Authentication required for <Service>", "details": [...], "isError": true}`.
//! 2. Read the token for its declared scope and place it into the outbound
//!    `Authorization` header.
//! 3. Non-success downstream statuses become
//!    `{"error": "Status <code>", "message": <body>, "isError": true}`.

pub mod diagnostics;
pub mod repo_host;
pub mod research;
pub mod tracker;

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::orchestrator::Orchestrator;
use crate::application::registry::{OperationRegistry, RegistryError};
use crate::domain::access_context::ScopedAccess;
use crate::domain::broker_config::{ResearchConfig, ResourcesConfig};
use crate::domain::grant::AccessToken;
use crate::domain::identity::ResourceScope;

pub const USER_AGENT: &str = concat!("keywarden/", env!("CARGO_PKG_VERSION"));

/// Payload returned when the request lacks a grant the operation needs.
pub fn auth_required(service: &str, details: Value) -> Value {
    let error = if service.is_empty() {
        "Authentication required".to_string()
    } else {
        format!("Authentication required for {}", service)
    };
    json!({
        "error": error,
        "details": details,
        "isError": true,
    })
}

/// Payload for a non-success downstream status.
pub fn downstream_error(status: StatusCode, body: String) -> Value {
    json!({
        "error": format!("Status {}", status.as_u16()),
        "message": body,
        "isError": true,
    })
}

/// Payload for a downstream request that never produced a response.
pub fn request_failed(error: reqwest::Error) -> Value {
    json!({
        "error": "Request failed",
        "message": error.without_url().to_string(),
        "isError": true,
    })
}

/// Token for `scope`, or the authentication-required payload for `service`.
pub(crate) fn bearer_for(
    access: &ScopedAccess<'_>,
    scope: &ResourceScope,
    service: &str,
) -> Result<AccessToken, Value> {
    if access.has_errors() {
        return Err(auth_required(service, json!(access.errors())));
    }
    access
        .token(scope)
        .map_err(|e| auth_required(service, json!([{ "scope": scope, "message": e.to_string() }])))
}

/// Register every built-in operation.
pub fn register_builtin_operations(
    registry: &mut OperationRegistry,
    resources: &ResourcesConfig,
    research: &ResearchConfig,
    http: reqwest::Client,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), RegistryError> {
    let tracker_scope = ResourceScope::new(resources.tracker.clone());
    let repo_scope = ResourceScope::new(resources.repo_host.clone());

    diagnostics::register(registry, &tracker_scope, &repo_scope)?;
    tracker::register(registry, http.clone(), &resources.tracker)?;
    repo_host::register(registry, http, &resources.repo_host)?;
    research::register(registry, research, orchestrator, &tracker_scope, &repo_scope)?;

    tracing::info!(operations = registry.len(), "Registered built-in operations");
    Ok(())
}
