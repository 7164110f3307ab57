// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Grant Binding
//!
//! Explicit composition that attaches a static set of required
//! [`ResourceScope`]s to an [`Operation`]. Invoking the bound operation first
//! resolves every scope against the request's [`AccessContext`], then runs the
//! body exactly once regardless of how many resolutions failed. The body sees
//! the outcome through [`ScopedAccess::has_errors`] and decides how to degrade.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::domain::access_context::{AccessContext, ScopedAccess};
use crate::domain::identity::ResourceScope;
use crate::domain::operation::{Arguments, Operation, OperationError};

/// Ordered, de-duplicated list of scopes an operation requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantBinding {
    scopes: Vec<ResourceScope>,
}

impl GrantBinding {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceScope>,
    {
        let mut unique: Vec<ResourceScope> = Vec::new();
        for scope in scopes {
            let scope = scope.into();
            if !unique.contains(&scope) {
                unique.push(scope);
            }
        }
        Self { scopes: unique }
    }

    /// Binding with no required scopes; the body runs unmodified.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn scopes(&self) -> &[ResourceScope] {
        &self.scopes
    }

    pub fn bind(self, operation: Arc<dyn Operation>) -> GrantedOperation {
        GrantedOperation {
            binding: self,
            operation,
        }
    }

    /// Resolve every declared scope concurrently on the calling task.
    pub async fn resolve_all(&self, context: &AccessContext) {
        if self.scopes.is_empty() {
            return;
        }
        join_all(self.scopes.iter().map(|scope| context.resolve(scope))).await;
    }
}

/// An operation wrapped by its [`GrantBinding`].
pub struct GrantedOperation {
    binding: GrantBinding,
    operation: Arc<dyn Operation>,
}

impl GrantedOperation {
    pub fn scopes(&self) -> &[ResourceScope] {
        self.binding.scopes()
    }

    /// Run the operation for one request: resolve, then execute (fail-open).
    pub async fn invoke(
        &self,
        context: &AccessContext,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        self.binding.resolve_all(context).await;

        if context.has_errors() {
            debug!(
                request_id = %context.request_id(),
                scopes = ?self.binding.scopes(),
                "Running operation body with incomplete authorization"
            );
        }

        let access = ScopedAccess::new(context, self.binding.scopes());
        self.operation.execute(&access, arguments).await
    }
}

impl std::fmt::Debug for GrantedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantedOperation")
            .field("scopes", &self.binding.scopes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_context::ScopeAccessError;
    use crate::domain::audit::NoopAuditSink;
    use crate::domain::credential_provider::CredentialProvider;
    use crate::domain::grant::{AuthorizationError, IssuedToken};
    use crate::domain::identity::Identity;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DenyRepoHost;

    #[async_trait]
    impl CredentialProvider for DenyRepoHost {
        async fn exchange(
            &self,
            _identity: &Identity,
            scope: &ResourceScope,
        ) -> Result<IssuedToken, AuthorizationError> {
            match scope.as_str() {
                "repo-host" => Err(AuthorizationError::scope_not_provisioned("not provisioned")),
                other => Ok(IssuedToken::bearer(format!("{other}-token"), None)),
            }
        }
    }

    #[derive(Default)]
    struct CountingOperation {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Operation for CountingOperation {
        async fn execute(
            &self,
            access: &ScopedAccess<'_>,
            _arguments: Arguments,
        ) -> Result<Value, OperationError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let undeclared = access.token(&ResourceScope::from("billing"));
            Ok(json!({
                "has_errors": access.has_errors(),
                "undeclared_rejected": matches!(undeclared, Err(ScopeAccessError::Undeclared(_))),
                "tracker_ok": access.token(&ResourceScope::from("tracker")).is_ok(),
            }))
        }
    }

    fn context() -> AccessContext {
        AccessContext::new(
            Identity::new("alice", "jwt"),
            Arc::new(DenyRepoHost),
            Arc::new(NoopAuditSink),
        )
    }

    #[test]
    fn test_binding_deduplicates_scopes() {
        let binding = GrantBinding::new(["tracker", "repo-host", "tracker"]);
        assert_eq!(binding.scopes().len(), 2);
        assert_eq!(binding.scopes()[0].as_str(), "tracker");
    }

    #[tokio::test]
    async fn test_body_runs_once_when_a_scope_fails() {
        let operation = Arc::new(CountingOperation::default());
        let granted = GrantBinding::new(["tracker", "repo-host"]).bind(operation.clone());
        let context = context();

        let result = granted.invoke(&context, Arguments::new()).await.unwrap();

        assert_eq!(operation.runs.load(Ordering::SeqCst), 1);
        assert_eq!(result["has_errors"], true);
        assert_eq!(result["tracker_ok"], true);
        assert_eq!(result["undeclared_rejected"], true);
        assert_eq!(context.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_scopes_runs_body_without_resolution() {
        let operation = Arc::new(CountingOperation::default());
        let granted = GrantBinding::none().bind(operation.clone());
        let context = context();

        let result = granted.invoke(&context, Arguments::new()).await.unwrap();

        assert_eq!(operation.runs.load(Ordering::SeqCst), 1);
        assert_eq!(result["has_errors"], false);
        assert!(context.resolved_scopes().is_empty());
    }
}
