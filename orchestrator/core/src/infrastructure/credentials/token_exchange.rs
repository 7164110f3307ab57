// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OAuth 2.0 Token Exchange Provider (RFC 8693)
//
// Anti-corruption layer over the identity broker's token endpoint. The caller's
// bearer credential is the `subject_token`; the resource scope is sent as the
// `resource` parameter. OAuth error codes are translated into the domain's
// `AuthorizationReason` values.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::credential_provider::CredentialProvider;
use crate::domain::grant::{AccessToken, AuthorizationError, AuthorizationReason, IssuedToken};
use crate::domain::identity::{Identity, ResourceScope};

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const TOKEN_TYPE_JWT: &str = "urn:ietf:params:oauth:token-type:jwt";
const TOKEN_TYPE_ACCESS: &str = "urn:ietf:params:oauth:token-type:access_token";

pub struct TokenExchangeProvider {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenExchangeProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

fn reason_for(code: &str, status: StatusCode) -> AuthorizationReason {
    match code {
        "consent_required" | "interaction_required" => AuthorizationReason::ConsentRequired,
        "invalid_target" | "unauthorized_client" => AuthorizationReason::ScopeNotProvisioned,
        "invalid_grant" | "invalid_token" | "invalid_request" => AuthorizationReason::IdentityInvalid,
        "login_required" => AuthorizationReason::ReauthenticationRequired,
        _ if status == StatusCode::UNAUTHORIZED => AuthorizationReason::IdentityInvalid,
        _ => AuthorizationReason::ProviderUnavailable,
    }
}

/// Map a non-success token endpoint response to a domain error.
fn map_failure(status: StatusCode, body: &str) -> AuthorizationError {
    if status.is_server_error() {
        return AuthorizationError::provider_unavailable(format!(
            "token endpoint returned {}",
            status.as_u16()
        ));
    }
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(oauth) => AuthorizationError::new(
            reason_for(&oauth.error, status),
            oauth.error_description.unwrap_or(oauth.error),
        ),
        Err(_) if status == StatusCode::UNAUTHORIZED => {
            AuthorizationError::identity_invalid("token endpoint rejected the subject token")
        }
        Err(_) => AuthorizationError::provider_unavailable(format!(
            "unexpected token endpoint response ({})",
            status.as_u16()
        )),
    }
}

#[async_trait]
impl CredentialProvider for TokenExchangeProvider {
    async fn exchange(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<IssuedToken, AuthorizationError> {
        let form = [
            ("grant_type", GRANT_TYPE),
            ("subject_token", identity.bearer_token()),
            ("subject_token_type", TOKEN_TYPE_JWT),
            ("requested_token_type", TOKEN_TYPE_ACCESS),
            ("resource", scope.as_str()),
        ];

        debug!(subject = %identity.subject(), scope = %scope, "Exchanging subject token");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(scope = %scope, error = %e.without_url(), "Token endpoint unreachable");
                AuthorizationError::provider_unavailable("token endpoint unreachable")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = map_failure(status, &body);
            debug!(scope = %scope, status = status.as_u16(), reason = %error.reason, "Token exchange refused");
            return Err(error);
        }

        let token: TokenResponse = response.json().await.map_err(|_| {
            AuthorizationError::provider_unavailable("token endpoint returned an unreadable body")
        })?;

        Ok(IssuedToken {
            access_token: AccessToken::new(token.access_token),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: token
                .expires_in
                .filter(|secs| *secs > 0)
                .and_then(|secs| IssuedToken::expiry_after(Utc::now(), secs)),
        })
    }
}
