// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Context (per-request authorization state)
//!
//! One [`AccessContext`] exists per inbound request. It owns the verified
//! [`Identity`], a memoized cache of resolved [`AccessGrant`]s keyed by
//! [`ResourceScope`], and an append-only list of [`AuthorizationFailure`]s.
//!
//! ## Resolution
//!
//! ```text
//! resolve(scope)
//!   └─ cache hit  → cached AccessGrant (no exchange)
//!   └─ cache miss → CredentialProvider::exchange(identity, scope)
//!         ├─ Ok  → AccessGrant::Granted
//!         └─ Err → AccessGrant::Denied + AuthorizationFailure appended
//!         └─ AuditSink::record(...)
//! ```
//!
//! Each scope slot is a `tokio::sync::OnceCell`: concurrent resolutions of the
//! same scope within one request share a single exchange, and a resolution
//! whose future is dropped mid-exchange leaves the slot uninitialized.
//!
//! ## Views handed to other components
//!
//! - [`ScopedAccess`]: what an operation body sees. Tokens can only be read for
//!   the scopes the operation declared.
//! - [`Delegation`]: opaque handle used to build tool adapters and orchestrator
//!   pipelines over the same context. It yields no tokens.
//!
//! The context is not `Clone`. Adapters and pipelines borrow it for the
//! request's lifetime, which keeps them on the request's own task.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::domain::credential_provider::CredentialProvider;
use crate::domain::grant::{AccessGrant, AccessToken, AuthorizationFailure, AuthorizationReason};
use crate::domain::identity::{Identity, RequestId, ResourceScope};

type GrantSlot = Arc<OnceCell<AccessGrant>>;

pub struct AccessContext {
    request_id: RequestId,
    identity: Identity,
    provider: Arc<dyn CredentialProvider>,
    audit: Arc<dyn AuditSink>,
    grants: Mutex<HashMap<ResourceScope, GrantSlot>>,
    errors: Mutex<Vec<AuthorizationFailure>>,
}

impl AccessContext {
    pub fn new(
        identity: Identity,
        provider: Arc<dyn CredentialProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            identity,
            provider,
            audit,
            grants: Mutex::new(HashMap::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Resolve `scope` for this request's identity, exchanging at most once.
    ///
    /// Provider failures are returned as [`AccessGrant::Denied`] and recorded in
    /// [`AccessContext::errors`]; this method never fails.
    pub async fn resolve(&self, scope: &ResourceScope) -> AccessGrant {
        let slot = {
            let mut grants = self.grants.lock();
            grants
                .entry(scope.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_init(|| self.exchange(scope)).await.clone()
    }

    async fn exchange(&self, scope: &ResourceScope) -> AccessGrant {
        debug!(
            request_id = %self.request_id,
            subject = %self.identity.subject(),
            scope = %scope,
            "Exchanging identity for resource grant"
        );

        let grant = match self.provider.exchange(&self.identity, scope).await {
            Ok(token) => AccessGrant::Granted(token),
            Err(error) => {
                warn!(
                    request_id = %self.request_id,
                    subject = %self.identity.subject(),
                    scope = %scope,
                    reason = %error.reason,
                    "Grant resolution failed"
                );
                self.errors
                    .lock()
                    .push(AuthorizationFailure::new(scope.clone(), &error));
                AccessGrant::Denied(error)
            }
        };

        let outcome = AuditOutcome::from_grant(&grant);
        metrics::counter!(
            "keywarden_grant_resolutions_total",
            "outcome" => if outcome.is_granted() { "granted" } else { "denied" }
        )
        .increment(1);

        self.audit.record(AuditRecord {
            request_id: self.request_id,
            subject: self.identity.subject().to_string(),
            scope: scope.clone(),
            outcome,
            timestamp: Utc::now(),
        });

        grant
    }

    /// Cached grant for `scope`, if a resolution has completed.
    pub fn cached(&self, scope: &ResourceScope) -> Option<AccessGrant> {
        self.grants
            .lock()
            .get(scope)
            .and_then(|slot| slot.get().cloned())
    }

    /// Scopes whose resolution has completed (granted or denied).
    pub fn resolved_scopes(&self) -> Vec<ResourceScope> {
        let grants = self.grants.lock();
        let mut scopes: Vec<ResourceScope> = grants
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(scope, _)| scope.clone())
            .collect();
        scopes.sort();
        scopes
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    pub fn errors(&self) -> Vec<AuthorizationFailure> {
        self.errors.lock().clone()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Secrets of every granted token in this context, for output redaction.
    pub(crate) fn granted_secrets(&self) -> Vec<String> {
        self.grants
            .lock()
            .values()
            .filter_map(|slot| slot.get())
            .filter_map(|grant| grant.token())
            .map(|token| token.access_token.secret().to_string())
            .filter(|secret| !secret.is_empty())
            .collect()
    }

    pub fn delegate(&self) -> Delegation<'_> {
        Delegation { context: self }
    }
}

impl std::fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessContext")
            .field("request_id", &self.request_id)
            .field("identity", &self.identity)
            .field("resolved_scopes", &self.resolved_scopes())
            .field("error_count", &self.error_count())
            .finish()
    }
}

/// Reasons an operation body cannot read a token from its [`ScopedAccess`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeAccessError {
    #[error("Scope '{0}' was not declared by this operation")]
    Undeclared(ResourceScope),

    #[error("Scope '{0}' has not been resolved")]
    Unresolved(ResourceScope),

    #[error("Scope '{scope}' was denied: {reason}")]
    Denied {
        scope: ResourceScope,
        reason: AuthorizationReason,
    },

    #[error("Grant for scope '{0}' has expired")]
    Expired(ResourceScope),
}

/// Read-only view of an [`AccessContext`] handed to an operation body.
///
/// Built by a grant binding after it has resolved the operation's declared
/// scopes. Only those scopes' tokens can be read.
pub struct ScopedAccess<'a> {
    context: &'a AccessContext,
    declared: &'a [ResourceScope],
}

impl<'a> ScopedAccess<'a> {
    pub(crate) fn new(context: &'a AccessContext, declared: &'a [ResourceScope]) -> Self {
        Self { context, declared }
    }

    pub fn subject(&self) -> &str {
        self.context.identity().subject()
    }

    pub fn declared_scopes(&self) -> &[ResourceScope] {
        self.declared
    }

    /// Whether any resolution in this request has failed so far.
    pub fn has_errors(&self) -> bool {
        self.context.has_errors()
    }

    pub fn errors(&self) -> Vec<AuthorizationFailure> {
        self.context.errors()
    }

    /// Token for one of the operation's declared scopes.
    pub fn token(&self, scope: &ResourceScope) -> Result<AccessToken, ScopeAccessError> {
        if !self.declared.contains(scope) {
            return Err(ScopeAccessError::Undeclared(scope.clone()));
        }

        match self.context.cached(scope) {
            None => Err(ScopeAccessError::Unresolved(scope.clone())),
            Some(AccessGrant::Denied(error)) => Err(ScopeAccessError::Denied {
                scope: scope.clone(),
                reason: error.reason,
            }),
            Some(AccessGrant::Granted(token)) => {
                if token.is_expired_at(Utc::now()) {
                    Err(ScopeAccessError::Expired(scope.clone()))
                } else {
                    Ok(token.access_token)
                }
            }
        }
    }

    /// Handle for building tool adapters that call back into other operations
    /// under the same request context.
    pub fn delegate(&self) -> Delegation<'a> {
        Delegation {
            context: self.context,
        }
    }
}

/// Opaque, copyable borrow of an [`AccessContext`].
///
/// Carries the request context across tool adapters and orchestrator steps
/// without exposing tokens or the context itself.
#[derive(Clone, Copy)]
pub struct Delegation<'a> {
    context: &'a AccessContext,
}

impl<'a> Delegation<'a> {
    pub(crate) fn context(&self) -> &'a AccessContext {
        self.context
    }

    pub fn request_id(&self) -> RequestId {
        self.context.request_id()
    }

    pub fn has_errors(&self) -> bool {
        self.context.has_errors()
    }

    pub fn errors(&self) -> Vec<AuthorizationFailure> {
        self.context.errors()
    }
}

impl std::fmt::Debug for Delegation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegation")
            .field("request_id", &self.context.request_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::NoopAuditSink;
    use crate::domain::grant::{AuthorizationError, IssuedToken};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

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
            if scope.as_str() == "repo-host" {
                return Err(AuthorizationError::consent_required("connect the repository host"));
            }
            Ok(IssuedToken::bearer(
                format!("{}-{}-token", identity.subject(), scope),
                None,
            ))
        }
    }

    struct StalledProvider {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl CredentialProvider for StalledProvider {
        async fn exchange(
            &self,
            _identity: &Identity,
            _scope: &ResourceScope,
        ) -> Result<IssuedToken, AuthorizationError> {
            self.release.notified().await;
            Ok(IssuedToken::bearer("late-token", None))
        }
    }

    fn context_with(provider: Arc<dyn CredentialProvider>) -> AccessContext {
        AccessContext::new(
            Identity::new("alice", "alice-jwt"),
            provider,
            Arc::new(NoopAuditSink),
        )
    }

    #[tokio::test]
    async fn test_resolve_is_memoized() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = context_with(provider.clone());
        let scope = ResourceScope::from("tracker");

        let first = context.resolve(&scope).await;
        let second = context.resolve(&scope).await;

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_exchange() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = context_with(provider.clone());
        let scope = ResourceScope::from("tracker");

        let (a, b) = tokio::join!(context.resolve(&scope), context.resolve(&scope));

        assert_eq!(a, b);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denied_grant_is_recorded_once() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = context_with(provider.clone());
        let scope = ResourceScope::from("repo-host");

        assert!(!context.resolve(&scope).await.is_granted());
        assert!(!context.resolve(&scope).await.is_granted());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let errors = context.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].scope, scope);
        assert_eq!(errors[0].reason, AuthorizationReason::ConsentRequired);
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, record: AuditRecord) {
            self.records.lock().push(record);
        }
    }

    #[tokio::test]
    async fn test_one_audit_record_per_exchange() {
        let sink = Arc::new(RecordingSink::default());
        let context = AccessContext::new(
            Identity::new("alice", "alice-jwt"),
            Arc::new(CountingProvider {
                calls: AtomicUsize::new(0),
            }),
            sink.clone(),
        );
        let tracker = ResourceScope::from("tracker");
        let repo_host = ResourceScope::from("repo-host");

        for _ in 0..2 {
            context.resolve(&tracker).await;
            context.resolve(&repo_host).await;
        }

        let records = sink.records.lock().clone();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.subject == "alice" && r.request_id == context.request_id()));
        assert_eq!(records[0].scope, tracker);
        assert!(records[0].outcome.is_granted());
        assert_eq!(records[1].scope, repo_host);
        assert_eq!(
            records[1].outcome,
            AuditOutcome::Denied {
                reason: AuthorizationReason::ConsentRequired
            }
        );
    }

    #[test]
    fn test_dropped_exchange_leaves_no_cache_entry() {
        let release = Arc::new(Notify::new());
        let context = context_with(Arc::new(StalledProvider {
            release: release.clone(),
        }));
        let scope = ResourceScope::from("tracker");

        let mut pending = tokio_test::task::spawn(context.resolve(&scope));
        tokio_test::assert_pending!(pending.poll());
        drop(pending);

        assert!(context.cached(&scope).is_none());
        assert!(context.resolved_scopes().is_empty());
        assert!(!context.has_errors());
    }

    #[tokio::test]
    async fn test_scoped_access_rejects_undeclared_scope() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = context_with(provider);
        let tracker = ResourceScope::from("tracker");
        let other = ResourceScope::from("billing");
        context.resolve(&tracker).await;
        context.resolve(&other).await;

        let declared = vec![tracker.clone()];
        let access = ScopedAccess::new(&context, &declared);

        assert_eq!(access.token(&tracker).unwrap().secret(), "alice-tracker-token");
        assert_eq!(
            access.token(&other),
            Err(ScopeAccessError::Undeclared(other.clone()))
        );
    }

    #[tokio::test]
    async fn test_scoped_access_reports_denied_scope() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = context_with(provider);
        let repo = ResourceScope::from("repo-host");
        context.resolve(&repo).await;

        let declared = vec![repo.clone()];
        let access = ScopedAccess::new(&context, &declared);

        assert!(access.has_errors());
        assert!(matches!(
            access.token(&repo),
            Err(ScopeAccessError::Denied { reason: AuthorizationReason::ConsentRequired, .. })
        ));
    }
}
