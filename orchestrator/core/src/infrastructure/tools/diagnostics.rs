// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Connectivity and authorization diagnostics.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::application::registry::{OperationRegistration, OperationRegistry, RegistryError};
use crate::domain::access_context::ScopedAccess;
use crate::domain::identity::ResourceScope;
use crate::domain::operation::{parse_arguments, Arguments, Operation, OperationError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EchoParams {
    pub message: String,
}

pub struct Echo;

#[async_trait]
impl Operation for Echo {
    async fn execute(
        &self,
        _access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: EchoParams = parse_arguments(arguments)?;
        Ok(Value::String(format!("Echo: {}", params.message)))
    }
}

/// Reports, per declared scope, whether a grant was issued. Never returns the
/// token itself, only its length.
pub struct TestAuth {
    scopes: Vec<(String, ResourceScope)>,
}

#[async_trait]
impl Operation for TestAuth {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        _arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let mut report = Map::new();
        for (label, scope) in &self.scopes {
            let status = match access.token(scope) {
                Ok(token) => json!({
                    "scope": scope,
                    "status": "authenticated",
                    "token_length": token.len(),
                }),
                Err(e) => json!({
                    "scope": scope,
                    "status": "error",
                    "message": e.to_string(),
                }),
            };
            report.insert(label.clone(), status);
        }
        Ok(Value::Object(report))
    }
}

pub fn register(
    registry: &mut OperationRegistry,
    tracker: &ResourceScope,
    repo_host: &ResourceScope,
) -> Result<(), RegistryError> {
    registry.register(
        OperationRegistration::new(
            "echo",
            "Echo test operation; use it to verify the server is running.",
            Echo,
        )
        .parameters_for::<EchoParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "test_auth",
            "Report authorization status for the tracker and the repository host.",
            TestAuth {
                scopes: vec![
                    ("tracker".to_string(), tracker.clone()),
                    ("repo_host".to_string(), repo_host.clone()),
                ],
            },
        )
        .scopes([tracker.clone(), repo_host.clone()]),
    )?;
    Ok(())
}
