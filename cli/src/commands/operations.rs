// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operation discovery commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use keywarden_core::domain::broker_config::BrokerConfigManifest;
use keywarden_core::infrastructure::event_bus::EventBus;

use crate::embedded::build_registry;

#[derive(Subcommand)]
pub enum OperationsCommand {
    /// List registered operations with their required scopes
    List {
        /// Print descriptors (including parameter schemas) as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: OperationsCommand, config: BrokerConfigManifest) -> Result<()> {
    let registry = build_registry(&config, &EventBus::with_default_capacity())?;
    match command {
        OperationsCommand::List { json: true } => {
            println!("{}", serde_json::to_string_pretty(&registry.descriptors())?);
        }
        OperationsCommand::List { json: false } => {
            println!("{}", format!("{} operations", registry.len()).bold());
            for descriptor in registry.descriptors() {
                let scopes = if descriptor.scopes.is_empty() {
                    "(no scopes)".dimmed().to_string()
                } else {
                    descriptor
                        .scopes
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!("  {}  {}", descriptor.name.bold(), scopes);
                println!("      {}", descriptor.description);
            }
        }
    }
    Ok(())
}
