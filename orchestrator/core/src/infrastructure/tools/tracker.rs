// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task tracker operations (Linear GraphQL API).

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{bearer_for, downstream_error, request_failed, USER_AGENT};
use crate::application::registry::{OperationRegistration, OperationRegistry, RegistryError};
use crate::domain::access_context::ScopedAccess;
use crate::domain::grant::AccessToken;
use crate::domain::identity::ResourceScope;
use crate::domain::operation::{parse_arguments, Arguments, Operation, OperationError};

const SERVICE: &str = "Linear";

const ASSIGNED_ISSUES_QUERY: &str = r#"
query {
    viewer {
        assignedIssues(first: 50) {
            nodes {
                id
                identifier
                title
                description
                state { name }
                priority
                project { name }
            }
        }
    }
}
"#;

const ISSUE_QUERY: &str = r#"
query($identifier: String!) {
    issue(id: $identifier) {
        id
        identifier
        title
        description
        state { id name }
        priority
        labels { nodes { name } }
        assignee { name email }
        project { name }
        team { id name }
        comments { nodes { body user { name } createdAt } }
    }
}
"#;

const TEAM_STATES_QUERY: &str = r#"
query($teamId: String!) {
    team(id: $teamId) {
        states { nodes { id name type } }
    }
}
"#;

const ALL_TEAM_STATES_QUERY: &str = r#"
query {
    teams {
        nodes {
            id
            name
            states { nodes { id name type } }
        }
    }
}
"#;

const UPDATE_STATE_MUTATION: &str = r#"
mutation($id: String!, $stateId: String!) {
    issueUpdate(id: $id, input: { stateId: $stateId }) {
        success
        issue { id identifier state { name } }
    }
}
"#;

/// GraphQL client bound to one tracker base URL (which is also its scope).
#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    endpoint: String,
    scope: ResourceScope,
}

impl TrackerClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            scope: ResourceScope::new(base_url),
        }
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    async fn graphql(&self, token: &AccessToken, query: &str, variables: Value) -> Value {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.secret())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return request_failed(e),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return downstream_error(status, body);
        }

        response.json::<Value>().await.unwrap_or_else(|e| {
            json!({
                "error": "Invalid response from tracker",
                "message": e.without_url().to_string(),
                "isError": true,
            })
        })
    }

    async fn run(&self, access: &ScopedAccess<'_>, query: &str, variables: Value) -> Value {
        match bearer_for(access, &self.scope, SERVICE) {
            Ok(token) => self.graphql(&token, query, variables).await,
            Err(payload) => payload,
        }
    }
}

pub struct GetAssignedIssues {
    client: Arc<TrackerClient>,
}

#[async_trait]
impl Operation for GetAssignedIssues {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        _arguments: Arguments,
    ) -> Result<Value, OperationError> {
        Ok(self.client.run(access, ASSIGNED_ISSUES_QUERY, json!({})).await)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTaskParams {
    /// Issue identifier, e.g. "ENG-123"
    pub identifier: String,
}

pub struct GetTask {
    client: Arc<TrackerClient>,
}

#[async_trait]
impl Operation for GetTask {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: GetTaskParams = parse_arguments(arguments)?;
        Ok(self
            .client
            .run(access, ISSUE_QUERY, json!({ "identifier": params.identifier }))
            .await)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WorkflowStatesParams {
    /// Team to list states for; all accessible teams when omitted
    #[serde(default)]
    pub team_id: Option<String>,
}

pub struct GetWorkflowStates {
    client: Arc<TrackerClient>,
}

#[async_trait]
impl Operation for GetWorkflowStates {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: WorkflowStatesParams = parse_arguments(arguments)?;
        let (query, variables) = match params.team_id {
            Some(team_id) => (TEAM_STATES_QUERY, json!({ "teamId": team_id })),
            None => (ALL_TEAM_STATES_QUERY, json!({})),
        };
        Ok(self.client.run(access, query, variables).await)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskStatusParams {
    pub issue_id: String,
    /// Target state id (see get_workflow_states)
    pub state_id: String,
}

pub struct UpdateTaskStatus {
    client: Arc<TrackerClient>,
}

#[async_trait]
impl Operation for UpdateTaskStatus {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: UpdateTaskStatusParams = parse_arguments(arguments)?;
        Ok(self
            .client
            .run(
                access,
                UPDATE_STATE_MUTATION,
                json!({ "id": params.issue_id, "stateId": params.state_id }),
            )
            .await)
    }
}

pub fn register(
    registry: &mut OperationRegistry,
    http: reqwest::Client,
    base_url: &str,
) -> Result<(), RegistryError> {
    let client = Arc::new(TrackerClient::new(http, base_url));
    let scope = client.scope().clone();

    registry.register(
        OperationRegistration::new(
            "get_linear_issues",
            "Get tracker issues assigned to the authenticated user: id, identifier, title, description, state and priority.",
            GetAssignedIssues { client: client.clone() },
        )
        .scopes([scope.clone()]),
    )?;
    registry.register(
        OperationRegistration::new(
            "get_linear_task",
            "Get a tracker task by its identifier (e.g. 'ENG-123').",
            GetTask { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<GetTaskParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "get_workflow_states",
            "List the workflow states a task can be moved to, for one team or every team.",
            GetWorkflowStates { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<WorkflowStatesParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "update_task_status",
            "Move a tracker task to another workflow state. Requires issue_id and state_id.",
            UpdateTaskStatus { client },
        )
        .scopes([scope])
        .parameters_for::<UpdateTaskStatusParams>(),
    )?;
    Ok(())
}
