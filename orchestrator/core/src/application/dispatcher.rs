// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operation Dispatcher
//!
//! Entry point for one inbound call from a transport binding. Everything that
//! can be rejected is rejected before any grant is resolved:
//!
//! 1. verify the bearer credential → [`Identity`]
//! 2. look the operation up in the [`OperationRegistry`]
//! 3. validate the arguments against the operation's schema
//!
//! Then a fresh [`AccessContext`] is created for the request, the operation is
//! invoked under the request timeout and cancellation token, and the context is
//! dropped when the outcome is produced.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::registry::OperationRegistry;
use crate::application::tool_adapter::redact_secrets;
use crate::domain::access_context::AccessContext;
use crate::domain::audit::AuditSink;
use crate::domain::credential_provider::CredentialProvider;
use crate::domain::events::OperationEvent;
use crate::domain::grant::AuthorizationFailure;
use crate::domain::identity::{Identity, IdentityError, IdentityVerifier, RequestId};
use crate::domain::operation::OperationError;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),

    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Operation fault: {0}")]
    OperationFault(String),
}

/// Authorization state of the request at the time the result was produced.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationSummary {
    pub complete: bool,
    pub errors: Vec<AuthorizationFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub request_id: RequestId,
    pub result: Value,
    pub authorization: AuthorizationSummary,
}

pub struct OperationDispatcher {
    registry: Arc<OperationRegistry>,
    verifier: Arc<dyn IdentityVerifier>,
    provider: Arc<dyn CredentialProvider>,
    audit: Arc<dyn AuditSink>,
    request_timeout: Duration,
    event_bus: Option<EventBus>,
}

impl OperationDispatcher {
    pub fn new(
        registry: Arc<OperationRegistry>,
        verifier: Arc<dyn IdentityVerifier>,
        provider: Arc<dyn CredentialProvider>,
        audit: Arc<dyn AuditSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            verifier,
            provider,
            audit,
            request_timeout,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Verify `bearer`, then dispatch.
    pub async fn dispatch(
        &self,
        operation: &str,
        bearer: Option<&str>,
        arguments: Value,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        let bearer = bearer.filter(|b| !b.is_empty()).ok_or(IdentityError::Missing)?;
        let identity = self.verifier.verify(bearer).map_err(|e| {
            warn!(operation = %operation, error = %e, "Rejected inbound credential");
            e
        })?;
        self.dispatch_verified(operation, identity, arguments, cancel)
            .await
    }

    /// Dispatch on behalf of an identity the transport already verified.
    pub async fn dispatch_verified(
        &self,
        operation: &str,
        identity: Identity,
        arguments: Value,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        let registered = self
            .registry
            .get(operation)
            .ok_or_else(|| DispatchError::UnknownOperation(operation.to_string()))?;

        let arguments = registered
            .validate(arguments)
            .map_err(|e| DispatchError::InvalidArguments(operation_error_reason(e)))?;

        let context = AccessContext::new(identity, self.provider.clone(), self.audit.clone());
        let request_id = context.request_id();
        let started = Instant::now();

        info!(
            request_id = %request_id,
            operation = %operation,
            subject = %context.identity().subject(),
            "Dispatching operation"
        );
        self.publish(OperationEvent::OperationInvoked {
            request_id,
            operation: operation.to_string(),
            subject: context.identity().subject().to_string(),
            invoked_at: Utc::now(),
        });

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            outcome = tokio::time::timeout(self.request_timeout, registered.invoke(&context, arguments)) => {
                match outcome {
                    Err(_) => Err(DispatchError::TimedOut(self.request_timeout)),
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(OperationError::InvalidArguments(reason))) => {
                        Err(DispatchError::InvalidArguments(reason))
                    }
                    Ok(Err(OperationError::Fault(reason))) => Err(DispatchError::OperationFault(reason)),
                }
            }
        };

        match result {
            Ok(value) => {
                let errors = context.errors();
                let complete = errors.is_empty();
                self.publish(OperationEvent::OperationCompleted {
                    request_id,
                    operation: operation.to_string(),
                    authorization_complete: complete,
                    duration_ms: started.elapsed().as_millis() as u64,
                    completed_at: Utc::now(),
                });
                Ok(DispatchOutcome {
                    request_id,
                    result: redact_secrets(value, &context.granted_secrets()),
                    authorization: AuthorizationSummary { complete, errors },
                })
            }
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    operation = %operation,
                    error = %e,
                    "Operation dispatch failed"
                );
                self.publish(OperationEvent::OperationFailed {
                    request_id,
                    operation: operation.to_string(),
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    fn publish(&self, event: OperationEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_operation_event(event);
        }
    }
}

fn operation_error_reason(error: OperationError) -> String {
    match error {
        OperationError::InvalidArguments(reason) | OperationError::Fault(reason) => reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::OperationRegistration;
    use crate::domain::access_context::ScopedAccess;
    use crate::domain::audit::NoopAuditSink;
    use crate::domain::grant::{AuthorizationError, IssuedToken};
    use crate::domain::identity::ResourceScope;
    use crate::domain::operation::{Arguments, Operation};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PrefixVerifier;

    impl IdentityVerifier for PrefixVerifier {
        fn verify(&self, bearer: &str) -> Result<Identity, IdentityError> {
            bearer
                .strip_prefix("user:")
                .map(|subject| Identity::new(subject, bearer))
                .ok_or_else(|| IdentityError::Invalid("unknown token".into()))
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn exchange(
            &self,
            identity: &Identity,
            scope: &ResourceScope,
        ) -> Result<IssuedToken, AuthorizationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if scope.as_str() == "slow" {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(IssuedToken::bearer(format!("{}-secret", identity.subject()), None))
        }
    }

    struct Whoami;

    #[async_trait]
    impl Operation for Whoami {
        async fn execute(
            &self,
            access: &ScopedAccess<'_>,
            _arguments: Arguments,
        ) -> Result<Value, OperationError> {
            let token = access
                .token(&ResourceScope::from("tracker"))
                .map_err(|e| OperationError::Fault(e.to_string()))?;
            Ok(json!({ "subject": access.subject(), "leak": token.secret() }))
        }
    }

    struct Nothing;

    #[async_trait]
    impl Operation for Nothing {
        async fn execute(
            &self,
            _access: &ScopedAccess<'_>,
            _arguments: Arguments,
        ) -> Result<Value, OperationError> {
            Ok(Value::Null)
        }
    }

    fn dispatcher(provider: Arc<CountingProvider>, timeout: Duration) -> OperationDispatcher {
        let mut registry = OperationRegistry::new();
        registry
            .register(OperationRegistration::new("whoami", "Who am I", Whoami).scopes(["tracker"]))
            .unwrap();
        registry
            .register(OperationRegistration::new("slow", "Slow grant", Nothing).scopes(["slow"]))
            .unwrap();
        OperationDispatcher::new(
            Arc::new(registry),
            Arc::new(PrefixVerifier),
            provider,
            Arc::new(NoopAuditSink),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_dispatch_returns_result_and_authorization() {
        let provider = Arc::new(CountingProvider::default());
        let dispatcher = dispatcher(provider.clone(), Duration::from_secs(5));

        let outcome = dispatcher
            .dispatch("whoami", Some("user:alice"), Value::Null, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result["subject"], "alice");
        assert_eq!(outcome.result["leak"], "[REDACTED]");
        assert!(outcome.authorization.complete);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejections_happen_before_resolution() {
        let provider = Arc::new(CountingProvider::default());
        let dispatcher = dispatcher(provider.clone(), Duration::from_secs(5));
        let cancel = CancellationToken::new;

        assert!(matches!(
            dispatcher.dispatch("whoami", None, Value::Null, cancel()).await,
            Err(DispatchError::InvalidIdentity(IdentityError::Missing))
        ));
        assert!(matches!(
            dispatcher.dispatch("whoami", Some("garbage"), Value::Null, cancel()).await,
            Err(DispatchError::InvalidIdentity(IdentityError::Invalid(_)))
        ));
        assert!(matches!(
            dispatcher.dispatch("nope", Some("user:alice"), Value::Null, cancel()).await,
            Err(DispatchError::UnknownOperation(_))
        ));
        assert!(matches!(
            dispatcher.dispatch("whoami", Some("user:alice"), json!("text"), cancel()).await,
            Err(DispatchError::InvalidArguments(_))
        ));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_while_exchange_pending() {
        let provider = Arc::new(CountingProvider::default());
        let dispatcher = dispatcher(provider, Duration::from_millis(20));

        let err = dispatcher
            .dispatch("slow", Some("user:alice"), Value::Null, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_cancellation_while_exchange_pending() {
        let provider = Arc::new(CountingProvider::default());
        let dispatcher = dispatcher(provider, Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let (result, _) = tokio::join!(
            dispatcher.dispatch("slow", Some("user:alice"), Value::Null, cancel),
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                trigger.cancel();
            }
        );
        assert!(matches!(result, Err(DispatchError::Cancelled)));
    }
}
