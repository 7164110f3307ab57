// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `research_task`: runs the research pipeline under the caller's access
//! context and returns the implementation plan.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::auth_required;
use crate::application::orchestrator::Orchestrator;
use crate::application::registry::{
    OperationRegistration, OperationRegistry, RegisteredOperation, RegistryError,
};
use crate::application::research::{research_pipeline, ResearchRequest, ResearchTools};
use crate::domain::access_context::ScopedAccess;
use crate::domain::broker_config::ResearchConfig;
use crate::domain::identity::ResourceScope;
use crate::domain::operation::{parse_arguments, Arguments, Operation, OperationError};

pub const OPERATION_NAME: &str = "research_task";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResearchTaskParams {
    /// Tracker task identifier, e.g. "ENG-123"
    pub task_identifier: String,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Run the web research step when a search operation is configured
    #[serde(default = "default_true")]
    pub enable_web_search: bool,
}

fn default_true() -> bool {
    true
}

pub struct ResearchTask {
    orchestrator: Arc<Orchestrator>,
    tools: ResearchTools,
    max_files: usize,
}

#[async_trait]
impl Operation for ResearchTask {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: ResearchTaskParams = parse_arguments(arguments)?;

        if access.has_errors() {
            return Ok(auth_required("", json!(access.errors())));
        }

        let request = ResearchRequest {
            task_identifier: params.task_identifier,
            owner: params.owner,
            repo: params.repo,
            enable_web_search: params.enable_web_search,
        };
        info!(
            subject = %access.subject(),
            task = %request.task_identifier,
            repo = %request.repo_slug(),
            "Starting task research"
        );

        let pipeline = research_pipeline(&self.tools, &request, self.max_files);
        let report = self
            .orchestrator
            .run(&pipeline, access.delegate(), request.inputs())
            .await
            .map_err(|e| OperationError::Fault(e.to_string()))?;

        Ok(json!({
            "success": true,
            "task": request.task_identifier,
            "repo": request.repo_slug(),
            "implementation_plan": report.final_output,
            "authorization": {
                "complete": report.authorization_complete,
                "errors": report.authorization_errors,
            },
        }))
    }
}

fn dependency(
    registry: &OperationRegistry,
    name: &str,
) -> Result<Arc<RegisteredOperation>, RegistryError> {
    registry
        .get(name)
        .ok_or_else(|| RegistryError::MissingDependency {
            operation: OPERATION_NAME.to_string(),
            dependency: name.to_string(),
        })
}

/// Register `research_task`. The tracker and repository-host operations must
/// already be registered.
pub fn register(
    registry: &mut OperationRegistry,
    config: &ResearchConfig,
    orchestrator: Arc<Orchestrator>,
    tracker: &ResourceScope,
    repo_host: &ResourceScope,
) -> Result<(), RegistryError> {
    let tools = ResearchTools {
        task: dependency(registry, "get_linear_task")?,
        repo_structure: dependency(registry, "get_repo_structure")?,
        read_file: dependency(registry, "read_file")?,
        search: config
            .search_operation
            .as_deref()
            .map(|name| dependency(registry, name))
            .transpose()?,
    };

    registry.register(
        OperationRegistration::new(
            OPERATION_NAME,
            "Research a tracker task against a repository and produce an implementation plan: \
             analyzes the task, explores the codebase, optionally researches best practices \
             and writes a step-by-step plan.",
            ResearchTask {
                orchestrator,
                tools,
                max_files: config.max_files,
            },
        )
        .scopes([tracker.clone(), repo_host.clone()])
        .parameters_for::<ResearchTaskParams>(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_is_reported() {
        let mut registry = OperationRegistry::new();
        let err = register(
            &mut registry,
            &ResearchConfig::default(),
            Arc::new(Orchestrator::new()),
            &ResourceScope::new("https://api.linear.app"),
            &ResourceScope::new("https://api.github.com"),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::MissingDependency { ref dependency, .. } if dependency == "get_linear_task"
        ));
        assert!(registry.is_empty());
    }
}
