// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Caller Identity & Resource Scopes
//!
//! [`Identity`] is the verified caller established at the transport boundary by an
//! external identity provider. It is immutable for the lifetime of one inbound
//! request and is only ever handed to the [`crate::domain::credential_provider::CredentialProvider`]
//! as the subject of a token exchange.
//!
//! [`ResourceScope`] names the external API an access token is valid for
//! (typically its base URL, e.g. `https://api.github.com`).

use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

/// Identifier of one inbound request (and therefore of one `AccessContext`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verified caller of one inbound request.
///
/// Holds the subject claim (used for logging and audit) and the raw bearer
/// credential the caller presented (used as the `subject_token` of a token
/// exchange). The bearer credential never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    subject: String,
    bearer: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>, bearer: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            bearer: bearer.into(),
        }
    }

    /// Subject claim of the verified caller (e.g. `"alice"`).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Raw bearer credential presented by the caller.
    pub fn bearer_token(&self) -> &str {
        &self.bearer
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("bearer", &"<redacted>")
            .finish()
    }
}

/// Identifier of an external resource/API that access tokens are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceScope(String);

impl ResourceScope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceScope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceScope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Errors produced while verifying an inbound bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing bearer credential")]
    Missing,

    #[error("Invalid bearer credential: {0}")]
    Invalid(String),
}

/// Domain interface over the external identity provider.
///
/// Implementations validate the caller's bearer credential and produce a
/// verified [`Identity`]. Validation happens before any operation lookup or
/// grant resolution.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, bearer: &str) -> Result<Identity, IdentityError>;
}
