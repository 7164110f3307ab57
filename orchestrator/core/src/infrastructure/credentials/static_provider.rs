// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Static credential table.
//!
//! Grants are configured per `(subject, scope)` pair. Pairs without an entry
//! resolve to `consent_required`, which is what a real broker reports for a
//! user who never connected the resource. Used for local development and as
//! the test double of the token-exchange provider.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::domain::credential_provider::CredentialProvider;
use crate::domain::grant::{AuthorizationError, IssuedToken};
use crate::domain::identity::{Identity, ResourceScope};

#[derive(Debug, Clone)]
enum Entry {
    Token {
        value: String,
        expires_in: Option<Duration>,
    },
    Denied(AuthorizationError),
}

#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    entries: HashMap<(String, ResourceScope), Entry>,
    exchanges: AtomicUsize,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(
        mut self,
        subject: impl Into<String>,
        scope: impl Into<ResourceScope>,
        token: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            (subject.into(), scope.into()),
            Entry::Token {
                value: token.into(),
                expires_in: None,
            },
        );
        self
    }

    pub fn grant_expiring(
        mut self,
        subject: impl Into<String>,
        scope: impl Into<ResourceScope>,
        token: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        self.entries.insert(
            (subject.into(), scope.into()),
            Entry::Token {
                value: token.into(),
                expires_in: Some(expires_in),
            },
        );
        self
    }

    /// Answer `(subject, scope)` with a specific failure instead of the
    /// default `consent_required`.
    pub fn deny(
        mut self,
        subject: impl Into<String>,
        scope: impl Into<ResourceScope>,
        error: AuthorizationError,
    ) -> Self {
        self.entries
            .insert((subject.into(), scope.into()), Entry::Denied(error));
        self
    }

    /// Number of `exchange` calls served so far.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn exchange(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<IssuedToken, AuthorizationError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        debug!(subject = %identity.subject(), scope = %scope, "Static credential lookup");

        match self
            .entries
            .get(&(identity.subject().to_string(), scope.clone()))
        {
            Some(Entry::Token { value, expires_in }) => Ok(IssuedToken::bearer(
                value.clone(),
                expires_in.and_then(|lifetime| Utc::now().checked_add_signed(lifetime)),
            )),
            Some(Entry::Denied(error)) => Err(error.clone()),
            None => Err(AuthorizationError::consent_required(format!(
                "'{}' has not connected {}",
                identity.subject(),
                scope
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grant::AuthorizationReason;

    #[tokio::test]
    async fn test_lookup_is_keyed_by_subject_and_scope() {
        let provider = StaticCredentialProvider::new()
            .grant("alice", "https://api.linear.app", "lin_alice")
            .grant("bob", "https://api.linear.app", "lin_bob");
        let alice = Identity::new("alice", "jwt-a");
        let bob = Identity::new("bob", "jwt-b");
        let tracker = ResourceScope::from("https://api.linear.app");

        let a = provider.exchange(&alice, &tracker).await.unwrap();
        let b = provider.exchange(&bob, &tracker).await.unwrap();

        assert_eq!(a.access_token.secret(), "lin_alice");
        assert_eq!(b.access_token.secret(), "lin_bob");
        assert_eq!(provider.exchange_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_entry_requires_consent() {
        let provider = StaticCredentialProvider::new();
        let err = provider
            .exchange(
                &Identity::new("alice", "jwt"),
                &ResourceScope::from("https://api.github.com"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason, AuthorizationReason::ConsentRequired);
    }

    #[tokio::test]
    async fn test_expiring_grant_sets_expiry() {
        let provider = StaticCredentialProvider::new().grant_expiring(
            "alice",
            "https://api.github.com",
            "ghs_x",
            Duration::minutes(10),
        );
        let token = provider
            .exchange(
                &Identity::new("alice", "jwt"),
                &ResourceScope::from("https://api.github.com"),
            )
            .await
            .unwrap();
        assert!(token.expires_at.is_some_and(|at| at > Utc::now()));
    }
}
