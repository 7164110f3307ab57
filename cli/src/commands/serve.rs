// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `keywarden serve`: run the HTTP binding until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use keywarden_core::domain::broker_config::BrokerConfigManifest;
use keywarden_core::infrastructure::event_bus::{EventBus, EventBusError};
use keywarden_core::presentation::api::{app, AppState};

use crate::embedded::Broker;

#[derive(Args)]
pub struct ServeCommand {
    /// Bind address (overrides spec.server.bind_address)
    #[arg(long, env = "KEYWARDEN_HOST")]
    pub host: Option<String>,

    /// HTTP port (overrides spec.server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn execute(command: ServeCommand, mut config: BrokerConfigManifest) -> Result<()> {
    if let Some(host) = command.host {
        config.spec.server.bind_address = host;
    }
    if let Some(port) = command.port {
        config.spec.server.port = port;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    install_metrics_exporter(&config)?;

    let broker = Broker::from_config(&config)?;
    metrics::gauge!("keywarden_registered_operations")
        .set(broker.dispatcher.registry().len() as f64);

    let shutdown = CancellationToken::new();
    tokio::spawn(log_domain_events(broker.event_bus.clone(), shutdown.clone()));

    let router = app(AppState::new(broker.dispatcher.clone(), shutdown.clone()));

    let addr = format!(
        "{}:{}",
        config.spec.server.bind_address, config.spec.server.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Keywarden listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server failed")?;

    info!("Keywarden shut down");
    Ok(())
}

fn install_metrics_exporter(config: &BrokerConfigManifest) -> Result<()> {
    let Some(metrics) = config
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.metrics.as_ref())
        .filter(|m| m.enabled)
    else {
        return Ok(());
    };

    let addr: SocketAddr = format!("{}:{}", config.spec.server.bind_address, metrics.port)
        .parse()
        .context("Invalid metrics listener address")?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

async fn log_domain_events(event_bus: EventBus, shutdown: CancellationToken) {
    let mut events = event_bus.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => debug!(request_id = %event.request_id(), event = ?event, "Domain event"),
                Err(EventBusError::Lagged(_)) | Err(EventBusError::Empty) => continue,
                Err(EventBusError::Closed) => break,
            },
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM and cancels `shutdown`, which cancels every
/// in-flight request.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
    shutdown.cancel();
}
