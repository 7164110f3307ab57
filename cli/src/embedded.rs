// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process composition of the broker services from a loaded configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use keywarden_core::{
    application::{
        dispatcher::OperationDispatcher, orchestrator::Orchestrator, registry::OperationRegistry,
    },
    domain::{audit::AuditSink, broker_config::BrokerConfigManifest},
    infrastructure::{
        audit::{EventBusAuditSink, FanoutAuditSink, TracingAuditSink},
        credentials::build_provider,
        event_bus::EventBus,
        identity::JwtIdentityVerifier,
        tools::{register_builtin_operations, USER_AGENT},
    },
};

/// Registry with every built-in operation, wired to `event_bus`.
pub fn build_registry(
    config: &BrokerConfigManifest,
    event_bus: &EventBus,
) -> Result<Arc<OperationRegistry>> {
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build downstream HTTP client")?;
    let orchestrator = Arc::new(Orchestrator::new().with_event_bus(event_bus.clone()));

    let mut registry = OperationRegistry::new();
    register_builtin_operations(
        &mut registry,
        &config.spec.resources,
        &config.spec.research,
        http,
        orchestrator,
    )
    .context("Failed to register built-in operations")?;
    Ok(Arc::new(registry))
}

pub struct Broker {
    pub dispatcher: Arc<OperationDispatcher>,
    pub event_bus: EventBus,
}

impl Broker {
    pub fn from_config(config: &BrokerConfigManifest) -> Result<Self> {
        let identity = config
            .spec
            .identity
            .as_ref()
            .context("spec.identity is required to serve requests")?;
        let verifier =
            JwtIdentityVerifier::from_config(identity).context("Failed to build identity verifier")?;
        let provider = build_provider(&config.spec.credentials)
            .context("Failed to build credential provider")?;

        let event_bus = EventBus::with_default_capacity();
        let audit: Arc<dyn AuditSink> = Arc::new(FanoutAuditSink::new(vec![
            Arc::new(TracingAuditSink),
            Arc::new(EventBusAuditSink::new(event_bus.clone())),
        ]));
        let registry = build_registry(config, &event_bus)?;

        info!(
            operations = registry.len(),
            timeout_seconds = config.spec.server.request_timeout_seconds,
            "Broker services initialized"
        );

        let dispatcher = OperationDispatcher::new(
            registry,
            Arc::new(verifier),
            provider,
            audit,
            Duration::from_secs(config.spec.server.request_timeout_seconds),
        )
        .with_event_bus(event_bus.clone());

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            event_bus,
        })
    }
}
