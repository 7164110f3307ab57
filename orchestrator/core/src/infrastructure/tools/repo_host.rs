// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository host operations (GitHub REST API v3).

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, RequestBuilder, StatusCode};
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

const SERVICE: &str = "GitHub";
const API_VERSION: &str = "2022-11-28";

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone)]
pub struct RepoHostClient {
    http: reqwest::Client,
    base_url: String,
    scope: ResourceScope,
}

/// Outcome of one REST call: either the decoded body with its status or a
/// ready-made error payload.
enum Reply {
    Body(StatusCode, Value),
    Failed(Value),
}

impl RepoHostClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            scope: ResourceScope::new(base_url),
        }
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    fn repo_url(&self, owner: &str, repo: &str, rest: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.base_url, owner, repo, rest)
    }

    fn request(&self, method: Method, url: &str, token: &AccessToken) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send and decode; statuses outside `accepted` become `Status <code>` payloads.
    async fn send(&self, request: RequestBuilder, accepted: &[StatusCode]) -> Reply {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Reply::Failed(request_failed(e)),
        };
        let status = response.status();
        if !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Reply::Failed(downstream_error(status, body));
        }
        match response.json::<Value>().await {
            Ok(body) => Reply::Body(status, body),
            Err(e) => Reply::Failed(json!({
                "error": "Invalid response from repository host",
                "message": e.without_url().to_string(),
                "isError": true,
            })),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RepoStructureParams {
    pub owner: String,
    pub repo: String,
    /// Subdirectory; repository root when empty
    #[serde(default)]
    pub path: String,
}

pub struct GetRepoStructure {
    client: Arc<RepoHostClient>,
}

#[async_trait]
impl Operation for GetRepoStructure {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: RepoStructureParams = parse_arguments(arguments)?;
        let token = match bearer_for(access, self.client.scope(), SERVICE) {
            Ok(token) => token,
            Err(payload) => return Ok(payload),
        };

        let url = self.client.repo_url(
            &params.owner,
            &params.repo,
            &format!("contents/{}", params.path.trim_start_matches('/')),
        );
        let request = self.client.request(Method::GET, &url, &token);

        Ok(match self.client.send(request, &[StatusCode::OK]).await {
            Reply::Body(_, Value::Array(entries)) => {
                let files: Vec<Value> = entries
                    .iter()
                    .map(|entry| {
                        json!({
                            "name": entry.get("name"),
                            "type": entry.get("type"),
                            "path": entry.get("path"),
                        })
                    })
                    .collect();
                json!({ "files": files })
            }
            Reply::Body(_, other) => other,
            Reply::Failed(payload) => payload,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    pub owner: String,
    pub repo: String,
    /// File path relative to the repository root
    pub path: String,
    /// Branch, tag or commit
    #[serde(rename = "ref", default = "default_branch")]
    pub git_ref: String,
}

pub struct ReadFile {
    client: Arc<RepoHostClient>,
}

#[async_trait]
impl Operation for ReadFile {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: ReadFileParams = parse_arguments(arguments)?;
        let token = match bearer_for(access, self.client.scope(), SERVICE) {
            Ok(token) => token,
            Err(payload) => return Ok(payload),
        };

        let url = self.client.repo_url(
            &params.owner,
            &params.repo,
            &format!("contents/{}", params.path.trim_start_matches('/')),
        );
        let request = self
            .client
            .request(Method::GET, &url, &token)
            .query(&[("ref", params.git_ref.as_str())]);

        let body = match self.client.send(request, &[StatusCode::OK]).await {
            Reply::Body(_, body) => body,
            Reply::Failed(payload) => return Ok(payload),
        };

        let encoded: String = body
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));

        Ok(match decoded {
            Ok(content) => json!({
                "path": params.path,
                "content": content,
                "sha": body.get("sha"),
            }),
            Err(reason) => json!({
                "error": "File content is not UTF-8 text",
                "message": reason,
                "isError": true,
            }),
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBranchParams {
    pub owner: String,
    pub repo: String,
    pub branch_name: String,
    #[serde(default = "default_branch")]
    pub from_branch: String,
}

pub struct CreateBranch {
    client: Arc<RepoHostClient>,
}

#[async_trait]
impl Operation for CreateBranch {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: CreateBranchParams = parse_arguments(arguments)?;
        let token = match bearer_for(access, self.client.scope(), SERVICE) {
            Ok(token) => token,
            Err(payload) => return Ok(payload),
        };

        let ref_url = self.client.repo_url(
            &params.owner,
            &params.repo,
            &format!("git/ref/heads/{}", params.from_branch),
        );
        let source = self.client.request(Method::GET, &ref_url, &token);
        let sha = match self.client.send(source, &[StatusCode::OK]).await {
            Reply::Body(_, body) => body
                .pointer("/object/sha")
                .and_then(Value::as_str)
                .map(str::to_string),
            Reply::Failed(payload) => {
                return Ok(json!({
                    "error": format!("Could not find branch {}", params.from_branch),
                    "details": payload.get("message").cloned().unwrap_or(payload),
                    "isError": true,
                }))
            }
        };
        let Some(sha) = sha else {
            return Ok(json!({
                "error": format!("Branch {} has no commit sha", params.from_branch),
                "isError": true,
            }));
        };

        let refs_url = self.client.repo_url(&params.owner, &params.repo, "git/refs");
        let create = self
            .client
            .request(Method::POST, &refs_url, &token)
            .json(&json!({ "ref": format!("refs/heads/{}", params.branch_name), "sha": sha }));

        Ok(match self.client.send(create, &[StatusCode::CREATED]).await {
            Reply::Body(..) => json!({ "success": true, "branch": params.branch_name, "sha": sha }),
            Reply::Failed(payload) => payload,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    pub owner: String,
    pub repo: String,
    pub path: String,
    /// New file content (plain text)
    pub content: String,
    /// Commit message
    pub message: String,
    pub branch: String,
    /// Current blob sha, required when updating an existing file
    #[serde(default)]
    pub sha: Option<String>,
}

pub struct WriteFile {
    client: Arc<RepoHostClient>,
}

#[async_trait]
impl Operation for WriteFile {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: WriteFileParams = parse_arguments(arguments)?;
        let token = match bearer_for(access, self.client.scope(), SERVICE) {
            Ok(token) => token,
            Err(payload) => return Ok(payload),
        };

        let mut body = json!({
            "message": params.message,
            "content": base64::engine::general_purpose::STANDARD.encode(params.content.as_bytes()),
            "branch": params.branch,
        });
        if let Some(sha) = params.sha.filter(|s| !s.is_empty()) {
            body["sha"] = Value::String(sha);
        }

        let url = self.client.repo_url(
            &params.owner,
            &params.repo,
            &format!("contents/{}", params.path.trim_start_matches('/')),
        );
        let request = self.client.request(Method::PUT, &url, &token).json(&body);

        Ok(
            match self
                .client
                .send(request, &[StatusCode::OK, StatusCode::CREATED])
                .await
            {
                Reply::Body(_, data) => json!({
                    "success": true,
                    "path": params.path,
                    "commit_sha": data.pointer("/commit/sha"),
                }),
                Reply::Failed(payload) => payload,
            },
        )
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePullRequestParams {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub body: String,
    /// Branch containing the changes
    pub head: String,
    #[serde(default = "default_branch")]
    pub base: String,
}

pub struct CreatePullRequest {
    client: Arc<RepoHostClient>,
}

#[async_trait]
impl Operation for CreatePullRequest {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        arguments: Arguments,
    ) -> Result<Value, OperationError> {
        let params: CreatePullRequestParams = parse_arguments(arguments)?;
        let token = match bearer_for(access, self.client.scope(), SERVICE) {
            Ok(token) => token,
            Err(payload) => return Ok(payload),
        };

        let url = self.client.repo_url(&params.owner, &params.repo, "pulls");
        let request = self.client.request(Method::POST, &url, &token).json(&json!({
            "title": params.title,
            "body": params.body,
            "head": params.head,
            "base": params.base,
        }));

        Ok(match self.client.send(request, &[StatusCode::CREATED]).await {
            Reply::Body(_, data) => json!({
                "success": true,
                "pr_number": data.get("number"),
                "url": data.get("html_url"),
            }),
            Reply::Failed(payload) => payload,
        })
    }
}

pub fn register(
    registry: &mut OperationRegistry,
    http: reqwest::Client,
    base_url: &str,
) -> Result<(), RegistryError> {
    let client = Arc::new(RepoHostClient::new(http, base_url));
    let scope = client.scope().clone();

    registry.register(
        OperationRegistration::new(
            "get_repo_structure",
            "List files and folders of a repository. Parameters: owner, repo, optional path of a subdirectory.",
            GetRepoStructure { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<RepoStructureParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "read_file",
            "Read a text file from a repository.",
            ReadFile { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<ReadFileParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "create_branch",
            "Create a branch from an existing branch.",
            CreateBranch { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<CreateBranchParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "write_file",
            "Create or update a file on a branch. Pass the sha from read_file when updating.",
            WriteFile { client: client.clone() },
        )
        .scopes([scope.clone()])
        .parameters_for::<WriteFileParams>(),
    )?;
    registry.register(
        OperationRegistration::new(
            "create_pull_request",
            "Open a pull request.",
            CreatePullRequest { client },
        )
        .scopes([scope])
        .parameters_for::<CreatePullRequestParams>(),
    )?;
    Ok(())
}
