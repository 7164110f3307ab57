// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Interface
//!
//! An [`Agent`] is the decision-making unit of one pipeline step. It receives a
//! rendered [`StepTask`] and the [`ToolBox`] of adapters it may call, and
//! returns its textual output. How an agent reasons (an LLM, a rule set, a
//! fixed script) is outside the broker; the trait is the seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::tool_adapter::{ToolBox, ToolError};

/// Role description of an agent, used for logging and prompt rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
}

impl AgentProfile {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }
}

/// Output of one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub step: String,
    pub output: String,
}

/// Work item handed to an agent for one step.
#[derive(Debug, Clone)]
pub struct StepTask {
    pub step: String,
    /// Step description rendered against pipeline inputs and prior outputs
    pub description: String,
    pub expected_output: String,
    /// Pipeline inputs as supplied by the caller
    pub inputs: Value,
    /// Outputs of every step that completed before this one, in order
    pub previous: Vec<StepOutput>,
}

impl StepTask {
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).and_then(Value::as_str)
    }

    pub fn output_of(&self, step: &str) -> Option<&str> {
        self.previous
            .iter()
            .find(|o| o.step == step)
            .map(|o| o.output.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Missing pipeline input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Agent fault: {0}")]
    Fault(String),
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn profile(&self) -> &AgentProfile;

    /// Perform one step. An `Err` is a step fault and aborts the pipeline;
    /// authorization gaps surface as tool payloads and should not be errors.
    async fn perform(&self, task: &StepTask, tools: &ToolBox<'_>) -> Result<String, AgentError>;
}
