// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::audit::AuditOutcome;
use crate::domain::identity::{RequestId, ResourceScope};

/// Grant resolution events, mirrored from the audit hook onto the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthorizationEvent {
    GrantResolved {
        request_id: RequestId,
        subject: String,
        scope: ResourceScope,
        outcome: AuditOutcome,
        resolved_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationEvent {
    OperationInvoked {
        request_id: RequestId,
        operation: String,
        subject: String,
        invoked_at: DateTime<Utc>,
    },
    OperationCompleted {
        request_id: RequestId,
        operation: String,
        authorization_complete: bool,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    OperationFailed {
        request_id: RequestId,
        operation: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    PipelineStarted {
        request_id: RequestId,
        pipeline: String,
        step_count: usize,
        started_at: DateTime<Utc>,
    },
    StepStarted {
        request_id: RequestId,
        pipeline: String,
        step: String,
        index: usize,
        started_at: DateTime<Utc>,
    },
    StepCompleted {
        request_id: RequestId,
        pipeline: String,
        step: String,
        index: usize,
        output_chars: usize,
        completed_at: DateTime<Utc>,
    },
    StepFailed {
        request_id: RequestId,
        pipeline: String,
        step: String,
        index: usize,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    PipelineCompleted {
        request_id: RequestId,
        pipeline: String,
        authorization_complete: bool,
        completed_at: DateTime<Utc>,
    },
}

impl PipelineEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::PipelineStarted { request_id, .. }
            | Self::StepStarted { request_id, .. }
            | Self::StepCompleted { request_id, .. }
            | Self::StepFailed { request_id, .. }
            | Self::PipelineCompleted { request_id, .. } => *request_id,
        }
    }
}

impl AuthorizationEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::GrantResolved { request_id, .. } => *request_id,
        }
    }
}

impl OperationEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::OperationInvoked { request_id, .. }
            | Self::OperationCompleted { request_id, .. }
            | Self::OperationFailed { request_id, .. } => *request_id,
        }
    }
}
