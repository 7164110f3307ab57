// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Grants
//!
//! An [`AccessGrant`] is the resolved outcome of one `(Identity, ResourceScope)`
//! pair: either an [`IssuedToken`] or the [`AuthorizationError`] the credential
//! provider returned. Authorization failures are data, not control flow: they
//! are recorded on the `AccessContext` as [`AuthorizationFailure`] entries and
//! the operation decides how to degrade.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::identity::ResourceScope;

/// Opaque access token value.
///
/// `Debug` and `Display` are redacted so a token can never reach a log line by
/// accident. Call [`AccessToken::secret`] at the exact point where the token is
/// placed into an outbound `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Token issued by the credential provider for one resource scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: AccessToken,
    pub token_type: String,
    /// `None` when the provider did not report a lifetime.
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    pub fn bearer(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: AccessToken::new(access_token),
            token_type: "Bearer".to_string(),
            expires_at,
        }
    }

    /// Expiry `seconds` after `now`, or `None` when that instant is not
    /// representable.
    pub fn expiry_after(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
        TimeDelta::try_seconds(seconds).and_then(|lifetime| now.checked_add_signed(lifetime))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expiry| expiry <= now).unwrap_or(false)
    }
}

/// Machine-readable reason a scope could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationReason {
    /// The user has not yet consented to the resource (interactive flow required).
    ConsentRequired,
    /// The resource is not provisioned for this application or caller.
    ScopeNotProvisioned,
    /// The caller's identity was rejected by the provider.
    IdentityInvalid,
    /// A previously valid grant expired and the caller must re-authenticate.
    ReauthenticationRequired,
    /// The provider could not be reached or answered with an unexpected response.
    ProviderUnavailable,
}

impl AuthorizationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentRequired => "consent_required",
            Self::ScopeNotProvisioned => "scope_not_provisioned",
            Self::IdentityInvalid => "identity_invalid",
            Self::ReauthenticationRequired => "reauthentication_required",
            Self::ProviderUnavailable => "provider_unavailable",
        }
    }
}

impl fmt::Display for AuthorizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by a credential provider exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct AuthorizationError {
    pub reason: AuthorizationReason,
    pub message: String,
}

impl AuthorizationError {
    pub fn new(reason: AuthorizationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn consent_required(message: impl Into<String>) -> Self {
        Self::new(AuthorizationReason::ConsentRequired, message)
    }

    pub fn scope_not_provisioned(message: impl Into<String>) -> Self {
        Self::new(AuthorizationReason::ScopeNotProvisioned, message)
    }

    pub fn identity_invalid(message: impl Into<String>) -> Self {
        Self::new(AuthorizationReason::IdentityInvalid, message)
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::new(AuthorizationReason::ProviderUnavailable, message)
    }
}

/// One entry of an `AccessContext`'s append-only error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationFailure {
    pub scope: ResourceScope,
    pub reason: AuthorizationReason,
    pub message: String,
}

impl AuthorizationFailure {
    pub fn new(scope: ResourceScope, error: &AuthorizationError) -> Self {
        Self {
            scope,
            reason: error.reason,
            message: error.message.clone(),
        }
    }
}

/// Resolved outcome of one `(Identity, ResourceScope)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGrant {
    Granted(IssuedToken),
    Denied(AuthorizationError),
}

impl AccessGrant {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Granted(token) => Some(token),
            Self::Denied(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AuthorizationError> {
        match self {
            Self::Granted(_) => None,
            Self::Denied(error) => Some(error),
        }
    }
}
