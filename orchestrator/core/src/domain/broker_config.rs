// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Broker Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - HTTP server binding and request timeout
// - Inbound identity verification (HS256 shared secret or RS256 public key)
// - Credential provider (static table or OAuth token exchange)
// - Downstream resource base URLs (also used as resource scopes)
// - Research pipeline limits
// - Logging and metrics

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "keywarden/v1";
pub const KIND: &str = "BrokerConfig";

/// Top-level broker configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfigManifest {
    /// API version (must be "keywarden/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "BrokerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: BrokerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    /// Inbound bearer verification. Required by `serve`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityConfig>,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub resources: ResourcesConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for one inbound operation call, including every grant
    /// exchange and pipeline step it triggers.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Expected `iss` claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Accepted `aud` values (empty = audience not checked)
    #[serde(default)]
    pub audiences: Vec<String>,

    /// HS256 shared secret (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs256_secret: Option<String>,

    /// RS256 public key, PEM encoded (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsa_public_key_pem: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialProviderKind {
    #[default]
    Static,
    TokenExchange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub provider: CredentialProviderKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_exchange: Option<TokenExchangeConfig>,

    #[serde(default)]
    pub static_grants: Vec<StaticGrantConfig>,
}

/// OAuth 2.0 token exchange (RFC 8693) endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExchangeConfig {
    pub endpoint: String,

    pub client_id: String,

    /// Client secret (supports "env:VAR_NAME")
    pub client_secret: String,

    #[serde(default = "default_exchange_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticGrantConfig {
    pub subject: String,
    pub scope: String,
    /// Token value (supports "env:VAR_NAME")
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

impl StaticGrantConfig {
    /// Configured token lifetime; an error when it does not fit a `TimeDelta`.
    pub fn lifetime(&self) -> anyhow::Result<Option<chrono::TimeDelta>> {
        self.expires_in_seconds
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(chrono::TimeDelta::try_seconds)
                    .ok_or_else(|| anyhow::anyhow!("expires_in_seconds {} is out of range", secs))
            })
            .transpose()
    }
}

/// Downstream API base URLs. Each URL doubles as the resource scope requested
/// from the credential provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_tracker")]
    pub tracker: String,

    #[serde(default = "default_repo_host")]
    pub repo_host: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            tracker: default_tracker(),
            repo_host: default_repo_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Maximum number of repository files the code analyst reads
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Registered operation used by the researcher step; when unset the step
    /// reports that no web research was performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_operation: Option<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            search_operation: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    300
}

fn default_exchange_timeout() -> u64 {
    10
}

fn default_tracker() -> String {
    "https://api.linear.app".to_string()
}

fn default_repo_host() -> String {
    "https://api.github.com".to_string()
}

fn default_max_files() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for BrokerConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "keywarden".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: BrokerConfigSpec::default(),
        }
    }
}

/// Resolve a configured secret (supports "env:VAR_NAME" syntax).
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
        None => Ok(value.to_string()),
    }
}

impl BrokerConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. KEYWARDEN_CONFIG_PATH environment variable
    /// 2. ./keywarden.yaml (working directory)
    /// 3. ~/.keywarden/config.yaml (user home)
    /// 4. /etc/keywarden/config.yaml (system, Unix) or C:\ProgramData\Keywarden\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KEYWARDEN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./keywarden.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".keywarden").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/keywarden/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Keywarden\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (KEYWARDEN_PORT, KEYWARDEN_LOG_LEVEL)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KEYWARDEN_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: KEYWARDEN_PORT={}", port);
                    self.spec.server.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for KEYWARDEN_PORT: '{}'. Ignoring.", val);
                }
            }
        }

        if let Ok(level) = std::env::var("KEYWARDEN_LOG_LEVEL") {
            tracing::info!("Environment override: KEYWARDEN_LOG_LEVEL={}", level);
            self.spec
                .observability
                .get_or_insert_with(ObservabilityConfig::default)
                .log_level = level;
        }
    }

    pub fn log_level(&self) -> &str {
        self.spec
            .observability
            .as_ref()
            .map(|o| o.log_level.as_str())
            .unwrap_or("info")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.server.port == 0 {
            anyhow::bail!("spec.server.port cannot be 0");
        }

        if self.spec.server.request_timeout_seconds == 0 {
            anyhow::bail!("spec.server.request_timeout_seconds must be greater than 0");
        }

        if let Some(identity) = &self.spec.identity {
            match (&identity.hs256_secret, &identity.rsa_public_key_pem) {
                (Some(_), Some(_)) => anyhow::bail!(
                    "spec.identity: configure either hs256_secret or rsa_public_key_pem, not both"
                ),
                (None, None) => anyhow::bail!(
                    "spec.identity: one of hs256_secret or rsa_public_key_pem is required"
                ),
                _ => {}
            }
        }

        for (field, value) in [
            ("spec.resources.tracker", &self.spec.resources.tracker),
            ("spec.resources.repo_host", &self.spec.resources.repo_host),
        ] {
            url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL ('{}'): {}", field, value, e))?;
        }

        match self.spec.credentials.provider {
            CredentialProviderKind::TokenExchange => {
                let exchange = self.spec.credentials.token_exchange.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "spec.credentials.token_exchange is required for provider 'token-exchange'"
                    )
                })?;
                url::Url::parse(&exchange.endpoint).map_err(|e| {
                    anyhow::anyhow!(
                        "spec.credentials.token_exchange.endpoint is not a valid URL: {}",
                        e
                    )
                })?;
                if exchange.client_id.is_empty() {
                    anyhow::bail!("spec.credentials.token_exchange.client_id cannot be empty");
                }
            }
            CredentialProviderKind::Static => {
                for grant in &self.spec.credentials.static_grants {
                    if grant.subject.is_empty() || grant.scope.is_empty() {
                        anyhow::bail!("Static grants require a non-empty subject and scope");
                    }
                    grant.lifetime().map_err(|e| {
                        anyhow::anyhow!(
                            "static grant for '{}' on {}: {}",
                            grant.subject,
                            grant.scope,
                            e
                        )
                    })?;
                }
            }
        }

        if let Some(search) = &self.spec.research.search_operation {
            if search.is_empty() {
                anyhow::bail!("spec.research.search_operation cannot be empty when set");
            }
        }

        if let Some(observability) = &self.spec.observability {
            if !matches!(observability.log_format.as_str(), "compact" | "json") {
                anyhow::bail!(
                    "Invalid log_format: '{}'. Must be 'compact' or 'json'",
                    observability.log_format
                );
            }
        }

        Ok(())
    }
}
