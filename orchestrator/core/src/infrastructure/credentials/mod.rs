// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credential provider implementations and their construction from config.

pub mod static_provider;
pub mod token_exchange;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::broker_config::{resolve_secret, CredentialProviderKind, CredentialsConfig};
use crate::domain::credential_provider::CredentialProvider;

pub use static_provider::StaticCredentialProvider;
pub use token_exchange::TokenExchangeProvider;

/// Build the configured provider, resolving `env:` secret references.
pub fn build_provider(config: &CredentialsConfig) -> Result<Arc<dyn CredentialProvider>> {
    match config.provider {
        CredentialProviderKind::Static => {
            let mut provider = StaticCredentialProvider::new();
            for grant in &config.static_grants {
                let token = resolve_secret(&grant.token).with_context(|| {
                    format!("static grant for '{}' on {}", grant.subject, grant.scope)
                })?;
                let lifetime = grant.lifetime().with_context(|| {
                    format!("static grant for '{}' on {}", grant.subject, grant.scope)
                })?;
                provider = match lifetime {
                    Some(lifetime) => provider.grant_expiring(
                        grant.subject.clone(),
                        grant.scope.clone(),
                        token,
                        lifetime,
                    ),
                    None => provider.grant(grant.subject.clone(), grant.scope.clone(), token),
                };
            }
            info!(grants = config.static_grants.len(), "Using static credential provider");
            Ok(Arc::new(provider))
        }
        CredentialProviderKind::TokenExchange => {
            let exchange = config
                .token_exchange
                .as_ref()
                .context("credentials.token_exchange is required for the token-exchange provider")?;
            let secret = resolve_secret(&exchange.client_secret)
                .context("credentials.token_exchange.client_secret")?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(exchange.timeout_seconds))
                .build()
                .context("Failed to build token exchange HTTP client")?;
            info!(endpoint = %exchange.endpoint, "Using token exchange credential provider");
            Ok(Arc::new(TokenExchangeProvider::new(
                client,
                exchange.endpoint.clone(),
                exchange.client_id.clone(),
                secret,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::broker_config::StaticGrantConfig;
    use crate::domain::identity::{Identity, ResourceScope};

    #[tokio::test]
    async fn test_build_static_provider_from_config() {
        let config = CredentialsConfig {
            static_grants: vec![StaticGrantConfig {
                subject: "alice".into(),
                scope: "https://api.linear.app".into(),
                token: "lin_local".into(),
                expires_in_seconds: Some(600),
            }],
            ..Default::default()
        };

        let provider = build_provider(&config).unwrap();
        let token = provider
            .exchange(
                &Identity::new("alice", "jwt"),
                &ResourceScope::from("https://api.linear.app"),
            )
            .await
            .unwrap();
        assert_eq!(token.access_token.secret(), "lin_local");
        assert!(token.expires_at.is_some());
    }

    #[test]
    fn test_out_of_range_grant_lifetime_is_rejected() {
        let config = CredentialsConfig {
            static_grants: vec![StaticGrantConfig {
                subject: "alice".into(),
                scope: "https://api.linear.app".into(),
                token: "lin_local".into(),
                expires_in_seconds: Some(u64::MAX),
            }],
            ..Default::default()
        };

        let error = build_provider(&config).err().unwrap();
        assert!(format!("{:#}", error).contains("out of range"));
    }

    #[test]
    fn test_token_exchange_requires_endpoint_config() {
        let config = CredentialsConfig {
            provider: CredentialProviderKind::TokenExchange,
            ..Default::default()
        };
        assert!(build_provider(&config).is_err());
    }
}
