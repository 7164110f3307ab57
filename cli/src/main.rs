// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Keywarden CLI
//!
//! The `keywarden` binary hosts the credential broker.
//!
//! ## Commands
//!
//! - `keywarden serve` - Run the HTTP binding
//! - `keywarden operations list` - List registered operations and their scopes
//! - `keywarden config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use keywarden_cli::commands::{self, ConfigCommand, OperationsCommand, ServeCommand};
use keywarden_core::domain::broker_config::BrokerConfigManifest;

/// Keywarden - resource-scoped credential broker for agent pipelines
#[derive(Parser)]
#[command(name = "keywarden")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "KEYWARDEN_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides spec.observability.log_level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker HTTP server
    #[command(name = "serve")]
    Serve(ServeCommand),

    /// Inspect registered operations
    #[command(name = "operations")]
    Operations {
        #[command(subcommand)]
        command: OperationsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = BrokerConfigManifest::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level().to_string());
    let format = config
        .spec
        .observability
        .as_ref()
        .map(|o| o.log_format.clone())
        .unwrap_or_else(|| "compact".to_string());
    init_logging(&level, &format)?;
    info!(config = %config.metadata.name, "Configuration loaded");

    match cli.command {
        Some(Commands::Serve(command)) => commands::serve::execute(command, config).await,
        Some(Commands::Operations { command }) => {
            commands::operations::handle_command(command, config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config, config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().with_current_span(true).init();
    } else {
        builder.with_target(false).compact().init();
    }

    Ok(())
}
