// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use keywarden_core::application::agent::{Agent, AgentError, AgentProfile, StepTask};
use keywarden_core::application::orchestrator::{Orchestrator, Pipeline, PipelineStep, StepTool};
use keywarden_core::application::registry::{
    OperationRegistration, OperationRegistry, RegisteredOperation,
};
use keywarden_core::application::tool_adapter::{ToolBox, REDACTED};
use keywarden_core::domain::access_context::{AccessContext, ScopedAccess};
use keywarden_core::domain::audit::NoopAuditSink;
use keywarden_core::domain::credential_provider::CredentialProvider;
use keywarden_core::domain::grant::{AuthorizationError, AuthorizationReason, IssuedToken};
use keywarden_core::domain::identity::{Identity, ResourceScope};
use keywarden_core::domain::operation::{Arguments, Operation, OperationError};
use keywarden_core::infrastructure::credentials::StaticCredentialProvider;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TRACKER: &str = "https://api.linear.app";
const REPO_HOST: &str = "https://api.github.com";

fn alice_with_tracker_only() -> Arc<StaticCredentialProvider> {
    Arc::new(
        StaticCredentialProvider::new()
            .grant("alice", TRACKER, "lin_alice_7c1d")
            .deny(
                "alice",
                REPO_HOST,
                AuthorizationError::consent_required("alice has not connected GitHub"),
            ),
    )
}

fn context(subject: &str, provider: Arc<dyn CredentialProvider>) -> AccessContext {
    AccessContext::new(
        Identity::new(subject, format!("jwt-{}", subject)),
        provider,
        Arc::new(NoopAuditSink),
    )
}

/// Reports which declared scopes yielded a token, and counts its runs.
struct ScopeReport {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Operation for ScopeReport {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        _arguments: Arguments,
    ) -> Result<Value, OperationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let report: serde_json::Map<String, Value> = access
            .declared_scopes()
            .iter()
            .map(|scope| (scope.to_string(), json!(access.token(scope).is_ok())))
            .collect();
        Ok(Value::Object(report))
    }
}

/// Returns the raw token for its scope; used to prove adapters redact it.
struct EchoToken {
    scope: ResourceScope,
}

#[async_trait]
impl Operation for EchoToken {
    async fn execute(
        &self,
        access: &ScopedAccess<'_>,
        _arguments: Arguments,
    ) -> Result<Value, OperationError> {
        match access.token(&self.scope) {
            Ok(token) => Ok(json!({ "token": token.secret(), "subject": access.subject() })),
            Err(e) => Ok(json!({ "error": e.to_string(), "isError": true })),
        }
    }
}

#[tokio::test]
async fn test_partial_grant_still_runs_body_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = OperationRegistry::new();
    let operation = registry
        .register(
            OperationRegistration::new("report", "scope report", ScopeReport { runs: runs.clone() })
                .scopes([TRACKER, REPO_HOST]),
        )
        .unwrap();
    let ctx = context("alice", alice_with_tracker_only());

    let result = operation.invoke(&ctx, Arguments::new()).await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(result[TRACKER], true);
    assert_eq!(result[REPO_HOST], false);
    let errors = ctx.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].scope, ResourceScope::from(REPO_HOST));
    assert_eq!(errors[0].reason, AuthorizationReason::ConsentRequired);
}

#[tokio::test]
async fn test_memoized_across_operations_in_one_request() {
    let provider = alice_with_tracker_only();
    let mut registry = OperationRegistry::new();
    let first = registry
        .register(
            OperationRegistration::new(
                "first",
                "tracker",
                EchoToken {
                    scope: TRACKER.into(),
                },
            )
            .scopes([TRACKER]),
        )
        .unwrap();
    let second = registry
        .register(
            OperationRegistration::new(
                "second",
                "tracker again",
                EchoToken {
                    scope: TRACKER.into(),
                },
            )
            .scopes([TRACKER]),
        )
        .unwrap();
    let ctx = context("alice", provider.clone());

    let a = first.invoke(&ctx, Arguments::new()).await.unwrap();
    let b = second.invoke(&ctx, Arguments::new()).await.unwrap();

    assert_eq!(a["token"], b["token"]);
    assert_eq!(provider.exchange_count(), 1);
    assert_eq!(ctx.resolved_scopes(), vec![ResourceScope::from(TRACKER)]);
}

/// Records every exchange and answers with a token derived from the subject.
struct RecordingProvider {
    calls: Mutex<Vec<(String, ResourceScope)>>,
}

#[async_trait]
impl CredentialProvider for RecordingProvider {
    async fn exchange(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<IssuedToken, AuthorizationError> {
        self.calls
            .lock()
            .push((identity.subject().to_string(), scope.clone()));
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(IssuedToken::bearer(
            format!("tok-{}-{}", identity.subject(), scope.as_str().len()),
            None,
        ))
    }
}

async fn invoke_twice(operation: &RegisteredOperation, ctx: &AccessContext) -> (Value, Value) {
    let first = operation.invoke(ctx, Arguments::new()).await.unwrap();
    let second = operation.invoke(ctx, Arguments::new()).await.unwrap();
    (first, second)
}

#[tokio::test]
async fn test_concurrent_requests_do_not_share_grants() {
    let provider = Arc::new(RecordingProvider {
        calls: Mutex::new(Vec::new()),
    });
    let mut registry = OperationRegistry::new();
    let operation = registry
        .register(
            OperationRegistration::new(
                "whoami",
                "token owner",
                EchoToken {
                    scope: TRACKER.into(),
                },
            )
            .scopes([TRACKER]),
        )
        .unwrap();

    let alice = context("alice", provider.clone());
    let bob = context("bob", provider.clone());

    let ((a1, a2), (b1, b2)) = tokio::join!(
        invoke_twice(&operation, &alice),
        invoke_twice(&operation, &bob)
    );

    let expected_alice = format!("tok-alice-{}", TRACKER.len());
    let expected_bob = format!("tok-bob-{}", TRACKER.len());
    assert_eq!(a1["token"], expected_alice.as_str());
    assert_eq!(a2["token"], expected_alice.as_str());
    assert_eq!(b1["token"], expected_bob.as_str());
    assert_eq!(b2["token"], expected_bob.as_str());

    let mut calls = provider.calls.lock().clone();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            ("alice".to_string(), ResourceScope::from(TRACKER)),
            ("bob".to_string(), ResourceScope::from(TRACKER)),
        ]
    );
}

/// Hangs until released; counts exchanges.
struct GatedProvider {
    open: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for GatedProvider {
    async fn exchange(
        &self,
        _identity: &Identity,
        _scope: &ResourceScope,
    ) -> Result<IssuedToken, AuthorizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.open.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(IssuedToken::bearer("late", None))
    }
}

#[tokio::test]
async fn test_cancelled_exchange_leaves_no_cache_entry() {
    let provider = Arc::new(GatedProvider {
        open: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    let ctx = context("alice", provider.clone());
    let scope = ResourceScope::from(TRACKER);

    let cancelled = tokio::time::timeout(Duration::from_millis(20), ctx.resolve(&scope)).await;

    assert!(cancelled.is_err());
    assert!(ctx.cached(&scope).is_none());
    assert!(ctx.resolved_scopes().is_empty());
    assert!(!ctx.has_errors());

    provider.open.store(true, Ordering::SeqCst);
    let grant = ctx.resolve(&scope).await;

    assert!(grant.is_granted());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

/// Calls every tool in its box and reports the payloads verbatim.
struct ToolCallingAgent {
    profile: AgentProfile,
    seen: Mutex<Option<StepTask>>,
}

impl ToolCallingAgent {
    fn new(role: &str) -> Arc<Self> {
        Arc::new(Self {
            profile: AgentProfile::new(role, "exercise tools"),
            seen: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn perform(&self, task: &StepTask, tools: &ToolBox<'_>) -> Result<String, AgentError> {
        *self.seen.lock() = Some(task.clone());
        let mut lines = Vec::new();
        for name in tools.names() {
            let payload = tools.call(name, Arguments::new()).await?;
            lines.push(format!("{} -> {}", name, payload));
        }
        if lines.is_empty() {
            lines.push(format!("summary of: {}", task.description));
        }
        Ok(lines.join("\n"))
    }
}

#[tokio::test]
async fn test_pipeline_continues_after_authorization_gap() {
    let mut registry = OperationRegistry::new();
    let tracker_op = registry
        .register(
            OperationRegistration::new(
                "tracker_token",
                "tracker",
                EchoToken {
                    scope: TRACKER.into(),
                },
            )
            .scopes([TRACKER]),
        )
        .unwrap();
    let repo_op = registry
        .register(
            OperationRegistration::new(
                "repo_token",
                "repo host",
                EchoToken {
                    scope: REPO_HOST.into(),
                },
            )
            .scopes([REPO_HOST]),
        )
        .unwrap();

    let step_one = ToolCallingAgent::new("Analyst");
    let step_two = ToolCallingAgent::new("Code reader");
    let step_three = ToolCallingAgent::new("Planner");
    let pipeline = Pipeline::new("three-step")
        .step(PipelineStep::new("one", step_one.clone()).tool(StepTool::new(tracker_op)))
        .step(PipelineStep::new("two", step_two.clone()).tool(StepTool::new(repo_op)))
        .step(
            PipelineStep::new("three", step_three.clone())
                .description("{{steps.one}} | {{steps.two}}"),
        );
    let ctx = context("alice", alice_with_tracker_only());

    let report = Orchestrator::new()
        .run(&pipeline, ctx.delegate(), json!({}))
        .await
        .unwrap();

    assert_eq!(report.outputs.len(), 3);
    assert!(!report.authorization_complete);
    assert!(ctx.has_errors());
    assert_eq!(report.authorization_errors[0].scope, ResourceScope::from(REPO_HOST));

    let two = report.output_of("two").unwrap();
    assert!(two.contains("isError"));

    let planner_task = step_three.seen.lock().clone().unwrap();
    assert_eq!(planner_task.output_of("two"), Some(two));
    assert!(report.final_output.starts_with("summary of: "));

    for output in &report.outputs {
        assert!(!output.output.contains("lin_alice_7c1d"), "{}", output.step);
    }
    assert!(report.output_of("one").unwrap().contains(REDACTED));
}
