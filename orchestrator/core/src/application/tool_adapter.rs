// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool Adapters
//!
//! A [`ToolAdapter`] is what an agent holds instead of an operation: a
//! registered operation plus a borrowed request context plus pre-bound
//! arguments. Agents call it with business arguments only.
//!
//! Adapters borrow the request's `AccessContext` for `'ctx`. They are awaited
//! inline on the request task and cannot be moved into a detached task.
//! Results pass through [`redact_secrets`] before they reach the agent.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::application::registry::RegisteredOperation;
use crate::domain::access_context::{AccessContext, Delegation};
use crate::domain::operation::{Arguments, OperationError};

pub const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' is not available to this agent")]
    NotAvailable(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    Fault { tool: String, reason: String },
}

pub struct ToolAdapter<'ctx> {
    operation: Arc<RegisteredOperation>,
    context: &'ctx AccessContext,
    bound: Arguments,
}

impl<'ctx> ToolAdapter<'ctx> {
    pub fn new(operation: Arc<RegisteredOperation>, delegation: Delegation<'ctx>) -> Self {
        Self {
            operation,
            context: delegation.context(),
            bound: Arguments::new(),
        }
    }

    /// Pre-bind an argument. Pre-bound values win over agent-supplied ones.
    pub fn with_bound(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bound.insert(key.into(), value.into());
        self
    }

    pub fn with_bound_arguments(mut self, arguments: Arguments) -> Self {
        self.bound.extend(arguments);
        self
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    pub fn description(&self) -> &str {
        &self.operation.descriptor().description
    }

    /// Invoke the wrapped operation with agent-supplied arguments.
    pub async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        let mut merged = arguments;
        for (key, value) in &self.bound {
            merged.insert(key.clone(), value.clone());
        }

        let merged = self
            .operation
            .validate(Value::Object(merged))
            .map_err(|e| self.tool_error(e))?;

        debug!(
            request_id = %self.context.request_id(),
            tool = %self.name(),
            "Agent invoking tool"
        );

        let result = self
            .operation
            .invoke(self.context, merged)
            .await
            .map_err(|e| self.tool_error(e))?;

        Ok(redact_secrets(result, &self.context.granted_secrets()))
    }

    fn tool_error(&self, error: OperationError) -> ToolError {
        let secrets = self.context.granted_secrets();
        let scrub = |text: String| match redact_secrets(Value::String(text), &secrets) {
            Value::String(text) => text,
            other => other.to_string(),
        };
        match error {
            OperationError::InvalidArguments(reason) => ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: scrub(reason),
            },
            OperationError::Fault(reason) => ToolError::Fault {
                tool: self.name().to_string(),
                reason: scrub(reason),
            },
        }
    }
}

impl std::fmt::Debug for ToolAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAdapter")
            .field("name", &self.name())
            .field("bound", &self.bound.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The tools one agent may call during one pipeline step.
#[derive(Debug, Default)]
pub struct ToolBox<'ctx> {
    tools: Vec<ToolAdapter<'ctx>>,
}

impl<'ctx> ToolBox<'ctx> {
    pub fn new(tools: Vec<ToolAdapter<'ctx>>) -> Self {
        Self { tools }
    }

    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&ToolAdapter<'ctx>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(ToolAdapter::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn call(&self, name: &str, arguments: Arguments) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotAvailable(name.to_string()))?;
        tool.call(arguments).await
    }
}

fn redact_text(mut text: String, secrets: &[String]) -> String {
    for secret in secrets {
        if text.contains(secret.as_str()) {
            text = text.replace(secret.as_str(), REDACTED);
        }
    }
    text
}

/// Replace every occurrence of any secret inside string values and object
/// keys with [`REDACTED`].
pub fn redact_secrets(value: Value, secrets: &[String]) -> Value {
    if secrets.is_empty() {
        return value;
    }
    match value {
        Value::String(text) => Value::String(redact_text(text, secrets)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| redact_secrets(item, secrets))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (redact_text(key, secrets), redact_secrets(item, secrets)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::{OperationRegistration, OperationRegistry};
    use crate::domain::access_context::ScopedAccess;
    use crate::domain::audit::NoopAuditSink;
    use crate::domain::credential_provider::CredentialProvider;
    use crate::domain::grant::{AuthorizationError, IssuedToken};
    use crate::domain::identity::{Identity, ResourceScope};
    use crate::domain::operation::Operation;
    use async_trait::async_trait;
    use serde_json::json;

    const FIXTURE: &str = "tok_fixture_9f8e7d";

    struct FixtureProvider;

    #[async_trait]
    impl CredentialProvider for FixtureProvider {
        async fn exchange(
            &self,
            _identity: &Identity,
            _scope: &ResourceScope,
        ) -> Result<IssuedToken, AuthorizationError> {
            Ok(IssuedToken::bearer(FIXTURE, None))
        }
    }

    /// Misbehaving operation that echoes its token and arguments back.
    struct LeakyOperation;

    #[async_trait]
    impl Operation for LeakyOperation {
        async fn execute(
            &self,
            access: &ScopedAccess<'_>,
            arguments: Arguments,
        ) -> Result<Value, OperationError> {
            let token = access
                .token(&ResourceScope::from("tracker"))
                .map_err(|e| OperationError::Fault(e.to_string()))?;
            Ok(json!({
                "header": format!("Bearer {}", token.secret()),
                "nested": [{ "raw": token.secret() }],
                "by_token": { (token.secret()): true },
                "arguments": arguments,
            }))
        }
    }

    fn registry() -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                OperationRegistration::new("leaky", "Echoes its token", LeakyOperation)
                    .scopes(["tracker"]),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_adapter_output_never_contains_token() {
        let registry = registry();
        let context = AccessContext::new(
            Identity::new("alice", "jwt"),
            Arc::new(FixtureProvider),
            Arc::new(NoopAuditSink),
        );
        let adapter = ToolAdapter::new(registry.get("leaky").unwrap(), context.delegate());

        let output = adapter.call(Arguments::new()).await.unwrap();
        let rendered = output.to_string();

        assert!(!rendered.contains(FIXTURE));
        assert_eq!(output["header"], format!("Bearer {}", REDACTED));
        assert_eq!(output["nested"][0]["raw"], REDACTED);
        assert_eq!(output["by_token"][REDACTED], true);
    }

    #[tokio::test]
    async fn test_bound_arguments_override_agent_arguments() {
        let registry = registry();
        let context = AccessContext::new(
            Identity::new("alice", "jwt"),
            Arc::new(FixtureProvider),
            Arc::new(NoopAuditSink),
        );
        let adapter = ToolAdapter::new(registry.get("leaky").unwrap(), context.delegate())
            .with_bound("owner", "acme")
            .with_bound("repo", "widgets");

        let mut args = Arguments::new();
        args.insert("owner".into(), json!("mallory"));
        args.insert("path".into(), json!("README.md"));

        let output = adapter.call(args).await.unwrap();
        assert_eq!(output["arguments"]["owner"], "acme");
        assert_eq!(output["arguments"]["repo"], "widgets");
        assert_eq!(output["arguments"]["path"], "README.md");
    }

    #[tokio::test]
    async fn test_toolbox_rejects_unknown_tool() {
        let toolbox = ToolBox::empty();
        let err = toolbox.call("read_file", Arguments::new()).await.unwrap_err();
        assert_eq!(err, ToolError::NotAvailable("read_file".into()));
    }

    #[test]
    fn test_redact_secrets_leaves_other_values() {
        let value = json!({ "count": 3, "ok": true, "text": "no secrets here" });
        let secrets = vec![FIXTURE.to_string()];
        assert_eq!(redact_secrets(value.clone(), &secrets), value);
    }
}
