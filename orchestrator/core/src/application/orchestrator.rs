// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pipeline Orchestrator
//!
//! Runs a fixed, ordered list of agent steps for one request.
//!
//! ```text
//! run(pipeline, delegation, inputs)
//!   1. build every step's ToolBox from the delegation (before any step runs)
//!   2. for each step in order:
//!        render description (inputs + prior outputs) → StepTask
//!        agent.perform(task, toolbox)  ── awaited inline on the request task
//!        push StepOutput
//!   3. final output = last step's output
//! ```
//!
//! Authorization gaps inside a step do not stop the pipeline; the report's
//! `authorization_complete` flag and error list tell the caller what happened.
//! An agent `Err` is a step fault: the remaining steps are skipped and
//! [`OrchestrationError::StepFailed`] is returned.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::agent::{Agent, AgentError, StepOutput, StepTask};
use crate::application::registry::RegisteredOperation;
use crate::application::tool_adapter::{ToolAdapter, ToolBox};
use crate::domain::access_context::Delegation;
use crate::domain::events::PipelineEvent;
use crate::domain::grant::AuthorizationFailure;
use crate::domain::identity::RequestId;
use crate::domain::operation::Arguments;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::template_engine::{StepTemplateContext, TemplateEngine};

/// A registered operation made available to one step, with pre-bound arguments.
#[derive(Debug, Clone)]
pub struct StepTool {
    operation: Arc<RegisteredOperation>,
    bound: Arguments,
}

impl StepTool {
    pub fn new(operation: Arc<RegisteredOperation>) -> Self {
        Self {
            operation,
            bound: Arguments::new(),
        }
    }

    pub fn with_bound(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bound.insert(key.into(), value.into());
        self
    }

    fn adapter<'ctx>(&self, delegation: Delegation<'ctx>) -> ToolAdapter<'ctx> {
        ToolAdapter::new(self.operation.clone(), delegation).with_bound_arguments(self.bound.clone())
    }
}

pub struct PipelineStep {
    name: String,
    description: String,
    expected_output: String,
    agent: Arc<dyn Agent>,
    tools: Vec<StepTool>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            expected_output: String::new(),
            agent,
            tools: Vec::new(),
        }
    }

    /// Handlebars template rendered against `inputs`, `steps` and `agent`.
    pub fn description(mut self, template: impl Into<String>) -> Self {
        self.description = template.into();
        self
    }

    pub fn expected_output(mut self, text: impl Into<String>) -> Self {
        self.expected_output = text.into();
        self
    }

    pub fn tool(mut self, tool: StepTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(PipelineStep::name).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub request_id: RequestId,
    pub pipeline: String,
    pub outputs: Vec<StepOutput>,
    pub final_output: String,
    pub authorization_complete: bool,
    pub authorization_errors: Vec<AuthorizationFailure>,
}

impl PipelineReport {
    pub fn output_of(&self, step: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.step == step)
            .map(|o| o.output.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Pipeline '{0}' has no steps")]
    EmptyPipeline(String),

    #[error("Failed to render description of step '{step}': {reason}")]
    Template { step: String, reason: String },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: AgentError,
    },
}

pub struct Orchestrator {
    templates: TemplateEngine,
    event_bus: Option<EventBus>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            templates: TemplateEngine::new(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn publish(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_pipeline_event(event);
        }
    }

    pub async fn run(
        &self,
        pipeline: &Pipeline,
        delegation: Delegation<'_>,
        inputs: Value,
    ) -> Result<PipelineReport, OrchestrationError> {
        if pipeline.steps.is_empty() {
            return Err(OrchestrationError::EmptyPipeline(pipeline.name.clone()));
        }

        let request_id = delegation.request_id();
        let toolboxes: Vec<ToolBox<'_>> = pipeline
            .steps
            .iter()
            .map(|step| ToolBox::new(step.tools.iter().map(|t| t.adapter(delegation)).collect()))
            .collect();

        info!(
            request_id = %request_id,
            pipeline = %pipeline.name,
            steps = pipeline.steps.len(),
            "Starting pipeline"
        );
        self.publish(PipelineEvent::PipelineStarted {
            request_id,
            pipeline: pipeline.name.clone(),
            step_count: pipeline.steps.len(),
            started_at: Utc::now(),
        });

        let mut outputs: Vec<StepOutput> = Vec::with_capacity(pipeline.steps.len());

        for (index, (step, tools)) in pipeline.steps.iter().zip(toolboxes.iter()).enumerate() {
            let context = StepTemplateContext::new(&inputs, &outputs, step.agent.profile());
            let description = self
                .templates
                .render(&step.description, &context)
                .map_err(|e| OrchestrationError::Template {
                    step: step.name.clone(),
                    reason: format!("{:#}", e),
                })?;

            let task = StepTask {
                step: step.name.clone(),
                description,
                expected_output: step.expected_output.clone(),
                inputs: inputs.clone(),
                previous: outputs.clone(),
            };

            info!(
                request_id = %request_id,
                step = %step.name,
                role = %step.agent.profile().role,
                tools = ?tools.names(),
                "Running pipeline step"
            );
            self.publish(PipelineEvent::StepStarted {
                request_id,
                pipeline: pipeline.name.clone(),
                step: step.name.clone(),
                index,
                started_at: Utc::now(),
            });

            match step.agent.perform(&task, tools).await {
                Ok(output) => {
                    metrics::counter!(
                        "keywarden_pipeline_steps_total",
                        "step" => step.name.clone(),
                        "status" => "completed"
                    )
                    .increment(1);
                    if delegation.has_errors() {
                        warn!(
                            request_id = %request_id,
                            step = %step.name,
                            "Step completed with incomplete authorization"
                        );
                    }
                    self.publish(PipelineEvent::StepCompleted {
                        request_id,
                        pipeline: pipeline.name.clone(),
                        step: step.name.clone(),
                        index,
                        output_chars: output.chars().count(),
                        completed_at: Utc::now(),
                    });
                    outputs.push(StepOutput {
                        step: step.name.clone(),
                        output,
                    });
                }
                Err(source) => {
                    metrics::counter!(
                        "keywarden_pipeline_steps_total",
                        "step" => step.name.clone(),
                        "status" => "failed"
                    )
                    .increment(1);
                    error!(
                        request_id = %request_id,
                        step = %step.name,
                        error = %source,
                        "Pipeline step failed; aborting remaining steps"
                    );
                    self.publish(PipelineEvent::StepFailed {
                        request_id,
                        pipeline: pipeline.name.clone(),
                        step: step.name.clone(),
                        index,
                        reason: source.to_string(),
                        failed_at: Utc::now(),
                    });
                    return Err(OrchestrationError::StepFailed {
                        step: step.name.clone(),
                        source,
                    });
                }
            }
        }

        let authorization_errors = delegation.errors();
        let authorization_complete = authorization_errors.is_empty();
        self.publish(PipelineEvent::PipelineCompleted {
            request_id,
            pipeline: pipeline.name.clone(),
            authorization_complete,
            completed_at: Utc::now(),
        });

        let final_output = outputs
            .last()
            .map(|o| o.output.clone())
            .unwrap_or_default();

        Ok(PipelineReport {
            request_id,
            pipeline: pipeline.name.clone(),
            outputs,
            final_output,
            authorization_complete,
            authorization_errors,
        })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
