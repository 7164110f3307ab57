// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credential Provider
//!
//! Domain interface over the external identity/OAuth broker that exchanges a
//! verified caller identity for a resource-scoped access token.
//!
//! Implementations live in `infrastructure::credentials`. A single provider
//! instance is shared by every concurrent request, so implementations must be
//! safe under concurrent use and must not keep per-request state.

use async_trait::async_trait;

use crate::domain::grant::{AuthorizationError, IssuedToken};
use crate::domain::identity::{Identity, ResourceScope};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Exchange `identity` for an access token valid for `scope`.
    ///
    /// Cancellation-safe: dropping the returned future must leave no partial
    /// state behind in the provider.
    async fn exchange(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<IssuedToken, AuthorizationError>;
}
