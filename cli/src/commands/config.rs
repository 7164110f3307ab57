// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use keywarden_core::domain::broker_config::{BrokerConfigManifest, CredentialProviderKind};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./keywarden.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
    config: BrokerConfigManifest,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(&config, config_override, paths),
        ConfigCommand::Validate { file: Some(file) } => {
            validate(&BrokerConfigManifest::load_or_default(Some(file))?)
        }
        ConfigCommand::Validate { file: None } => validate(&config),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(
    config: &BrokerConfigManifest,
    config_override: Option<PathBuf>,
    show_paths: bool,
) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. KEYWARDEN_CONFIG_PATH: {}",
            std::env::var("KEYWARDEN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./keywarden.yaml");
        println!("  4. ~/.keywarden/config.yaml");
        println!("  5. /etc/keywarden/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Configuration:".bold(), config.metadata.name);
    println!();

    println!("{}", "Server:".bold());
    println!("  Bind: {}:{}", spec.server.bind_address, spec.server.port);
    println!("  Request timeout: {}s", spec.server.request_timeout_seconds);
    println!();

    println!("{}", "Identity:".bold());
    match &spec.identity {
        Some(identity) => {
            let algorithm = if identity.rsa_public_key_pem.is_some() {
                "RS256"
            } else {
                "HS256"
            };
            println!("  Algorithm: {}", algorithm);
            println!("  Issuer: {}", identity.issuer.as_deref().unwrap_or("(any)"));
            if !identity.audiences.is_empty() {
                println!("  Audiences: {}", identity.audiences.join(", "));
            }
        }
        None => println!("  {}", "(not configured; `serve` requires it)".yellow()),
    }
    println!();

    println!("{}", "Credentials:".bold());
    match spec.credentials.provider {
        CredentialProviderKind::Static => {
            println!("  Provider: static");
            for grant in &spec.credentials.static_grants {
                println!("    - {} → {}", grant.subject, grant.scope);
            }
        }
        CredentialProviderKind::TokenExchange => {
            println!("  Provider: token-exchange");
            if let Some(exchange) = &spec.credentials.token_exchange {
                println!("  Endpoint: {}", exchange.endpoint);
                println!("  Client: {}", exchange.client_id);
            }
        }
    }
    println!();

    println!("{}", "Resources:".bold());
    println!("  Tracker: {}", spec.resources.tracker);
    println!("  Repository host: {}", spec.resources.repo_host);
    println!();

    println!("{}", "Research:".bold());
    println!("  Max files: {}", spec.research.max_files);
    println!(
        "  Search operation: {}",
        spec.research.search_operation.as_deref().unwrap_or("(none)")
    );
    println!();

    Ok(())
}

fn validate(config: &BrokerConfigManifest) -> Result<()> {
    println!("Validating configuration...");
    config
        .validate()
        .context("Configuration validation failed")?;
    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_templates_are_valid_manifests() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config =
                keywarden_core::domain::broker_config::BrokerConfigManifest::from_yaml_str(template)
                    .unwrap();
            config.validate().unwrap();
        }
    }
}
