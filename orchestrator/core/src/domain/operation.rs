// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operation contract
//!
//! An [`Operation`] is an externally invocable unit of work (a "tool"). Its body
//! receives a [`ScopedAccess`] view over the request's access context and the
//! caller's business arguments as a JSON object.
//!
//! Downstream API failures are part of the returned payload
//! (`{"error": ..., "isError": true}`); [`OperationError`] is reserved for
//! malformed arguments and unexpected faults.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::access_context::ScopedAccess;
use crate::domain::identity::ResourceScope;

/// Business arguments of one invocation.
pub type Arguments = serde_json::Map<String, Value>;

/// Introspection record exposed for capability discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub scopes: Vec<ResourceScope>,
    /// JSON Schema of the business arguments.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Operation fault: {0}")]
    Fault(String),
}

#[async_trait]
pub trait Operation: Send + Sync {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError>;
}

/// Deserialize business arguments into a typed parameter struct.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Arguments) -> Result<T, OperationError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| OperationError::InvalidArguments(e.to_string()))
}

/// JSON Schema for a parameter struct.
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}
