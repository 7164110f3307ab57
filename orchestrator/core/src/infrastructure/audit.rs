// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Grant Audit Sinks
//!
//! [`AuditSink`] implementations wired by the composition root.
//!
//! - [`TracingAuditSink`] writes each record to the structured log (`info!` for
//!   granted, `warn!` for denied) under the `keywarden::audit` target.
//! - [`EventBusAuditSink`] republishes records as
//!   [`AuthorizationEvent::GrantResolved`] so observers can stream them.
//! - [`FanoutAuditSink`] forwards to several sinks.
//!
//! All sinks are non-blocking and infallible. Persisting records is left to
//! whatever consumes the log or the event stream.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::domain::events::AuthorizationEvent;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match &record.outcome {
            AuditOutcome::Granted { expires_at } => info!(
                target: "keywarden::audit",
                request_id = %record.request_id,
                subject = %record.subject,
                scope = %record.scope,
                expires_at = ?expires_at,
                timestamp = %record.timestamp,
                "grant issued"
            ),
            AuditOutcome::Denied { reason } => warn!(
                target: "keywarden::audit",
                request_id = %record.request_id,
                subject = %record.subject,
                scope = %record.scope,
                reason = %reason,
                timestamp = %record.timestamp,
                "grant denied"
            ),
        }
    }
}

#[derive(Clone)]
pub struct EventBusAuditSink {
    event_bus: EventBus,
}

impl EventBusAuditSink {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

impl AuditSink for EventBusAuditSink {
    fn record(&self, record: AuditRecord) {
        self.event_bus
            .publish_authorization_event(AuthorizationEvent::GrantResolved {
                request_id: record.request_id,
                subject: record.subject,
                scope: record.scope,
                outcome: record.outcome,
                resolved_at: record.timestamp,
            });
    }
}

#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, record: AuditRecord) {
        for sink in &self.sinks {
            sink.record(record.clone());
        }
    }
}
