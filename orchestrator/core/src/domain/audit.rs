// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Grant Audit Hook
//!
//! Every grant resolution produces one [`AuditRecord`] delivered to the
//! injected [`AuditSink`]. Persisting the records is out of scope; the sink is
//! only a hook point.
//!
//! ## Delivery Contract
//!
//! `AuditSink::record` is synchronous and infallible. Implementations must
//! never block the request path: buffer, drop, or log instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::grant::{AccessGrant, AuthorizationReason};
use crate::domain::identity::{RequestId, ResourceScope};

/// Outcome portion of an audit record. Never carries token material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Granted {
        expires_at: Option<DateTime<Utc>>,
    },
    Denied {
        reason: AuthorizationReason,
    },
}

impl AuditOutcome {
    pub fn from_grant(grant: &AccessGrant) -> Self {
        match grant {
            AccessGrant::Granted(token) => Self::Granted {
                expires_at: token.expires_at,
            },
            AccessGrant::Denied(error) => Self::Denied {
                reason: error.reason,
            },
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// `{identity, scope, outcome, timestamp}` record of one grant resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: RequestId,
    pub subject: String,
    pub scope: ResourceScope,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Best-effort receiver of grant audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: AuditRecord) {}
}
