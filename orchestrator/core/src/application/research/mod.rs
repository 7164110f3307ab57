// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Research Pipeline
//!
//! Four sequential steps turning a tracker task into an implementation plan:
//!
//! | step                  | agent           | tools                                   |
//! |-----------------------|-----------------|-----------------------------------------|
//! | `task_analysis`       | task analyst    | `get_linear_task`                       |
//! | `code_context`        | code analyst    | `get_repo_structure`, `read_file`       |
//! | `research`            | researcher      | search operation, when enabled          |
//! | `implementation_plan` | planner         | none                                    |
//!
//! Repository tools get `owner` and `repo` pre-bound so the code analyst can
//! only look at the repository named in the request.

pub mod agents;
pub mod prompts;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::orchestrator::{Pipeline, PipelineStep, StepTool};
use crate::application::registry::RegisteredOperation;
use agents::{CodeAnalystAgent, PlannerAgent, ResearcherAgent, TaskAnalystAgent};

pub const PIPELINE_NAME: &str = "task_research";

pub const STEP_TASK_ANALYSIS: &str = "task_analysis";
pub const STEP_CODE_CONTEXT: &str = "code_context";
pub const STEP_RESEARCH: &str = "research";
pub const STEP_IMPLEMENTATION_PLAN: &str = "implementation_plan";

/// Registered operations the pipeline's agents call.
#[derive(Debug, Clone)]
pub struct ResearchTools {
    pub task: Arc<RegisteredOperation>,
    pub repo_structure: Arc<RegisteredOperation>,
    pub read_file: Arc<RegisteredOperation>,
    pub search: Option<Arc<RegisteredOperation>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub task_identifier: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_true")]
    pub enable_web_search: bool,
}

fn default_true() -> bool {
    true
}

impl ResearchRequest {
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Pipeline inputs visible to step templates as `inputs.*`.
    pub fn inputs(&self) -> Value {
        json!({
            "task_identifier": self.task_identifier,
            "owner": self.owner,
            "repo": self.repo,
            "enable_web_search": self.enable_web_search,
        })
    }
}

/// Build the research pipeline for one request.
pub fn research_pipeline(tools: &ResearchTools, request: &ResearchRequest, max_files: usize) -> Pipeline {
    let repo_tool = |operation: &Arc<RegisteredOperation>| {
        StepTool::new(operation.clone())
            .with_bound("owner", request.owner.clone())
            .with_bound("repo", request.repo.clone())
    };

    let mut research = PipelineStep::new(STEP_RESEARCH, Arc::new(ResearcherAgent::new()))
        .description(prompts::RESEARCH_DESCRIPTION)
        .expected_output(prompts::RESEARCH_EXPECTED);
    if request.enable_web_search {
        if let Some(search) = &tools.search {
            research = research.tool(StepTool::new(search.clone()));
        }
    }

    Pipeline::new(PIPELINE_NAME)
        .step(
            PipelineStep::new(STEP_TASK_ANALYSIS, Arc::new(TaskAnalystAgent::new()))
                .description(prompts::TASK_ANALYSIS_DESCRIPTION)
                .expected_output(prompts::TASK_ANALYSIS_EXPECTED)
                .tool(StepTool::new(tools.task.clone())),
        )
        .step(
            PipelineStep::new(STEP_CODE_CONTEXT, Arc::new(CodeAnalystAgent::new(max_files)))
                .description(prompts::CODE_CONTEXT_DESCRIPTION)
                .expected_output(prompts::CODE_CONTEXT_EXPECTED)
                .tool(repo_tool(&tools.repo_structure))
                .tool(repo_tool(&tools.read_file)),
        )
        .step(research)
        .step(
            PipelineStep::new(STEP_IMPLEMENTATION_PLAN, Arc::new(PlannerAgent::new()))
                .description(prompts::PLAN_DESCRIPTION)
                .expected_output(prompts::PLAN_EXPECTED),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::{OperationRegistration, OperationRegistry};
    use crate::domain::access_context::ScopedAccess;
    use crate::domain::operation::{Arguments, Operation, OperationError};
    use crate::infrastructure::template_engine::TemplateEngine;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Operation for Noop {
        async fn execute(
            &self,
            _access: &ScopedAccess<'_>,
            _arguments: Arguments,
        ) -> Result<Value, OperationError> {
            Ok(Value::Null)
        }
    }

    fn tools(with_search: bool) -> ResearchTools {
        let mut registry = OperationRegistry::new();
        let mut op = |name: &str| {
            registry
                .register(OperationRegistration::new(name, "test", Noop))
                .unwrap()
        };
        ResearchTools {
            task: op("get_linear_task"),
            repo_structure: op("get_repo_structure"),
            read_file: op("read_file"),
            search: with_search.then(|| op("web_search")),
        }
    }

    fn request(enable_web_search: bool) -> ResearchRequest {
        ResearchRequest {
            task_identifier: "ENG-42".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
            enable_web_search,
        }
    }

    #[test]
    fn test_pipeline_step_order() {
        let pipeline = research_pipeline(&tools(false), &request(true), 5);
        assert_eq!(
            pipeline.step_names(),
            vec![
                STEP_TASK_ANALYSIS,
                STEP_CODE_CONTEXT,
                STEP_RESEARCH,
                STEP_IMPLEMENTATION_PLAN
            ]
        );
        assert_eq!(pipeline.name(), PIPELINE_NAME);
    }

    #[test]
    fn test_request_defaults_web_search_on() {
        let request: ResearchRequest = serde_json::from_value(json!({
            "task_identifier": "ENG-1",
            "owner": "acme",
            "repo": "widgets"
        }))
        .unwrap();
        assert!(request.enable_web_search);
        assert_eq!(request.repo_slug(), "acme/widgets");
    }

    #[test]
    fn test_step_descriptions_are_valid_templates() {
        let engine = TemplateEngine::new();
        for template in [
            prompts::TASK_ANALYSIS_DESCRIPTION,
            prompts::CODE_CONTEXT_DESCRIPTION,
            prompts::RESEARCH_DESCRIPTION,
            prompts::PLAN_DESCRIPTION,
            prompts::PLAN_TEMPLATE,
        ] {
            engine.validate_template(template).unwrap();
        }
    }
}
