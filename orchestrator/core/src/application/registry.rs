// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operation Registry
//!
//! Name-indexed set of invocable operations. Each entry carries its
//! [`OperationDescriptor`] (for capability discovery), its grant-bound
//! implementation and a compiled JSON Schema validator for its arguments.
//!
//! The registry is assembled once at startup and then shared read-only
//! (`Arc<OperationRegistry>`) by the transport layer and by pipelines that
//! need direct references to registered operations.

use schemars::JsonSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::application::grant_binding::{GrantBinding, GrantedOperation};
use crate::domain::access_context::AccessContext;
use crate::domain::identity::ResourceScope;
use crate::domain::operation::{
    parameters_schema, Arguments, Operation, OperationDescriptor, OperationError,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Operation name cannot be empty")]
    EmptyName,

    #[error("Operation '{0}' is already registered")]
    Duplicate(String),

    #[error("Invalid parameter schema for '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("Operation '{operation}' depends on '{dependency}', which is not registered")]
    MissingDependency {
        operation: String,
        dependency: String,
    },
}

/// Registration surface: name, description, required scopes, parameter schema
/// and implementation.
pub struct OperationRegistration {
    name: String,
    description: String,
    binding: GrantBinding,
    parameters: Value,
    operation: Arc<dyn Operation>,
}

impl OperationRegistration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            binding: GrantBinding::none(),
            parameters: serde_json::json!({ "type": "object" }),
            operation: Arc::new(operation),
        }
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceScope>,
    {
        self.binding = GrantBinding::new(scopes);
        self
    }

    pub fn parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }

    pub fn parameters_for<T: JsonSchema>(self) -> Self {
        self.parameters(parameters_schema::<T>())
    }
}

pub struct RegisteredOperation {
    descriptor: OperationDescriptor,
    granted: GrantedOperation,
    validator: jsonschema::Validator,
}

impl RegisteredOperation {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn scopes(&self) -> &[ResourceScope] {
        self.granted.scopes()
    }

    /// Validate raw business arguments against the parameter schema.
    ///
    /// `null` is treated as an empty argument object; any other non-object
    /// value is rejected.
    pub fn validate(&self, arguments: Value) -> Result<Arguments, OperationError> {
        let arguments = match arguments {
            Value::Null => Arguments::new(),
            Value::Object(map) => map,
            other => {
                return Err(OperationError::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let instance = Value::Object(arguments);
        let problems: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect();
        if !problems.is_empty() {
            return Err(OperationError::InvalidArguments(problems.join("; ")));
        }

        match instance {
            Value::Object(map) => Ok(map),
            _ => Ok(Arguments::new()),
        }
    }

    /// Invoke under `context`: resolve declared scopes, then run the body.
    pub async fn invoke(
        &self,
        context: &AccessContext,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let result = self.granted.invoke(context, arguments).await;
        metrics::counter!(
            "keywarden_operation_invocations_total",
            "operation" => self.descriptor.name.clone(),
            "status" => if result.is_ok() { "ok" } else { "error" }
        )
        .increment(1);
        result
    }
}

impl std::fmt::Debug for RegisteredOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOperation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Arc<RegisteredOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        registration: OperationRegistration,
    ) -> Result<Arc<RegisteredOperation>, RegistryError> {
        let OperationRegistration {
            name,
            description,
            binding,
            parameters,
            operation,
        } = registration;

        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.operations.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let validator =
            jsonschema::validator_for(&parameters).map_err(|e| RegistryError::InvalidSchema {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let descriptor = OperationDescriptor {
            name: name.clone(),
            description,
            scopes: binding.scopes().to_vec(),
            parameters,
        };

        info!(
            operation = %descriptor.name,
            scopes = ?descriptor.scopes,
            "Registered operation"
        );

        let registered = Arc::new(RegisteredOperation {
            descriptor,
            granted: binding.bind(operation),
            validator,
        });
        self.operations.insert(name, registered.clone());
        Ok(registered)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredOperation>> {
        self.operations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Descriptors of every registered operation, sorted by name.
    pub fn descriptors(&self) -> Vec<OperationDescriptor> {
        self.operations
            .values()
            .map(|op| op.descriptor.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
