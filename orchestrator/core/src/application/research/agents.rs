// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Built-in research agents.
//!
//! Deterministic, tool-driven implementations of the four research roles.
//! They never see credentials: every privileged call goes through the
//! [`ToolBox`] handed to them by the orchestrator. Tool payloads that report
//! an error (authorization gap or downstream failure) are folded into the
//! step output rather than raised, so later steps still run.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use super::prompts;
use super::{STEP_CODE_CONTEXT, STEP_RESEARCH, STEP_TASK_ANALYSIS};
use crate::application::agent::{Agent, AgentError, AgentProfile, StepTask};
use crate::application::tool_adapter::ToolBox;
use crate::domain::operation::Arguments;
use crate::infrastructure::template_engine::TemplateEngine;

pub const TOOL_GET_TASK: &str = "get_linear_task";
pub const TOOL_REPO_STRUCTURE: &str = "get_repo_structure";
pub const TOOL_READ_FILE: &str = "read_file";

pub const NO_RESEARCH: &str = "No web research performed.";
const TASK_UNAVAILABLE: &str = "Task analysis unavailable";
const CODE_UNAVAILABLE: &str = "Code context unavailable";
const SNIPPET_LINES: usize = 40;

const MANIFESTS: &[&str] = &[
    "readme.md",
    "cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
];

const STOPWORDS: &[&str] = &[
    "task", "summary", "state", "priority", "team", "project", "requirements", "with", "from",
    "that", "this", "should", "must", "will", "when", "have", "into", "there", "their", "about",
    "acceptance", "criteria", "works", "described", "none", "potential", "challenges",
];

/// Error message carried by a tool payload, if the payload reports one.
fn payload_error(value: &Value) -> Option<String> {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let detail = value
            .get("message")
            .and_then(Value::as_str)
            .map(|m| format!(" ({})", m.lines().next().unwrap_or_default()))
            .unwrap_or_default();
        return Some(format!("{}{}", error, detail));
    }
    value
        .pointer("/errors/0/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn text<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- [ ] ", "- [x] ", "- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim();
        }
    }
    line
}

/// List items under a `## <heading>` section of a markdown document.
pub fn section_items(document: &str, heading: &str) -> Vec<String> {
    let marker = format!("## {}", heading);
    let mut items = Vec::new();
    let mut inside = false;
    for line in document.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("## ") {
            inside = trimmed == marker;
            continue;
        }
        if !inside || trimmed.is_empty() {
            continue;
        }
        let item = strip_list_marker(trimmed);
        if item != trimmed || trimmed.starts_with(char::is_numeric) {
            items.push(item.to_string());
        }
    }
    items
}

fn section_text(document: &str, heading: &str) -> Option<String> {
    let marker = format!("## {}", heading);
    let mut lines = Vec::new();
    let mut inside = false;
    for line in document.lines() {
        if line.trim().starts_with("## ") {
            if inside {
                break;
            }
            inside = line.trim() == marker;
            continue;
        }
        if inside {
            lines.push(line);
        }
    }
    let joined = lines.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(str::to_lowercase)
        .filter(|w| w.len() >= 4 && !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

// ============================================================================
// Task analyst
// ============================================================================

pub struct TaskAnalystAgent {
    profile: AgentProfile,
}

impl TaskAnalystAgent {
    pub fn new() -> Self {
        Self {
            profile: prompts::task_analyst(),
        }
    }
}

impl Default for TaskAnalystAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn analyze_issue(issue: &Value) -> String {
    let identifier = text(issue, "/identifier").unwrap_or("(unknown)");
    let title = text(issue, "/title").unwrap_or("(untitled)");
    let description = text(issue, "/description").unwrap_or_default();

    let mut out = String::new();
    out.push_str("## Task Summary\n");
    out.push_str(&format!("{}: {}\n", identifier, title));
    let mut facts = Vec::new();
    if let Some(state) = text(issue, "/state/name") {
        facts.push(format!("state {}", state));
    }
    if let Some(priority) = issue.get("priority").filter(|p| !p.is_null()) {
        facts.push(format!("priority {}", priority));
    }
    if let Some(team) = text(issue, "/team/name") {
        facts.push(format!("team {}", team));
    }
    if let Some(project) = text(issue, "/project/name") {
        facts.push(format!("project {}", project));
    }
    if !facts.is_empty() {
        out.push_str(&format!("({})\n", facts.join(", ")));
    }

    let requirements: Vec<&str> = description
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(strip_list_marker)
        .collect();

    out.push_str("\n## Requirements\n");
    if requirements.is_empty() {
        out.push_str(&format!("1. {}\n", title));
    } else {
        for (i, requirement) in requirements.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, requirement));
        }
    }

    out.push_str("\n## Acceptance Criteria\n");
    let criteria: Vec<&&str> = requirements
        .iter()
        .filter(|r| {
            let lower = r.to_lowercase();
            ["should", "must", "expect", "accept"]
                .iter()
                .any(|k| lower.contains(k))
        })
        .collect();
    if criteria.is_empty() {
        out.push_str(&format!("- [ ] {} works as described\n", title));
    } else {
        for criterion in criteria {
            out.push_str(&format!("- [ ] {}\n", criterion));
        }
    }

    if let Some(labels) = issue.pointer("/labels/nodes").and_then(Value::as_array) {
        let names: Vec<&str> = labels.iter().filter_map(|l| text(l, "/name")).collect();
        if !names.is_empty() {
            out.push_str(&format!("\nLabels: {}\n", names.join(", ")));
        }
    }

    out.push_str("\n## Potential Challenges\n");
    if description.is_empty() {
        out.push_str("- The task has no description; requirements must be clarified.\n");
    }
    if let Some(comments) = issue.pointer("/comments/nodes").and_then(Value::as_array) {
        for comment in comments {
            if let Some(body) = text(comment, "/body") {
                let author = text(comment, "/user/name").unwrap_or("someone");
                let first = body.lines().next().unwrap_or_default();
                out.push_str(&format!("- Raised by {}: {}\n", author, first));
            }
        }
    }
    out.push_str("- Confirm open questions with the task reporter before implementing.\n");
    out
}

#[async_trait]
impl Agent for TaskAnalystAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn perform(&self, task: &StepTask, tools: &ToolBox<'_>) -> Result<String, AgentError> {
        let identifier = task
            .input_str("task_identifier")
            .ok_or_else(|| AgentError::MissingInput("task_identifier".into()))?;

        let mut args = Arguments::new();
        args.insert("identifier".into(), json!(identifier));
        let response = tools.call(TOOL_GET_TASK, args).await?;

        if let Some(issue) = response.pointer("/data/issue").filter(|v| v.is_object()) {
            return Ok(analyze_issue(issue));
        }
        let reason = payload_error(&response).unwrap_or_else(|| "no issue returned".to_string());
        Ok(format!("{} for {}: {}", TASK_UNAVAILABLE, identifier, reason))
    }
}

// ============================================================================
// Code analyst
// ============================================================================

pub struct CodeAnalystAgent {
    profile: AgentProfile,
    max_files: usize,
}

impl CodeAnalystAgent {
    pub fn new(max_files: usize) -> Self {
        Self {
            profile: prompts::code_analyst(),
            max_files,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    path: String,
    score: usize,
    reasons: Vec<String>,
}

fn rank_files(entries: &[Value], terms: &BTreeSet<String>, limit: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = entries
        .iter()
        .filter(|e| e.get("type").and_then(Value::as_str) == Some("file"))
        .filter_map(|e| e.get("path").and_then(Value::as_str))
        .map(|path| {
            let lower = path.to_lowercase();
            let matched: Vec<String> = terms
                .iter()
                .filter(|t| lower.contains(t.as_str()))
                .cloned()
                .collect();
            let file_name = lower.rsplit('/').next().unwrap_or(&lower).to_string();
            let manifest = MANIFESTS.contains(&file_name.as_str());
            let mut reasons = Vec::new();
            if !matched.is_empty() {
                reasons.push(format!("matches {}", matched.join(", ")));
            }
            if manifest {
                reasons.push("project manifest".to_string());
            }
            Candidate {
                path: path.to_string(),
                score: matched.len() * 2 + usize::from(manifest),
                reasons,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    candidates.truncate(limit);
    candidates
}

#[async_trait]
impl Agent for CodeAnalystAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn perform(&self, task: &StepTask, tools: &ToolBox<'_>) -> Result<String, AgentError> {
        let repo = format!(
            "{}/{}",
            task.input_str("owner").unwrap_or_default(),
            task.input_str("repo").unwrap_or_default()
        );

        let listing = tools.call(TOOL_REPO_STRUCTURE, Arguments::new()).await?;
        let Some(entries) = listing.get("files").and_then(Value::as_array) else {
            let reason = payload_error(&listing).unwrap_or_else(|| "unexpected listing".into());
            return Ok(format!("{} for {}: {}", CODE_UNAVAILABLE, repo, reason));
        };

        let terms = keywords(task.output_of(STEP_TASK_ANALYSIS).unwrap_or_default());
        let selected = rank_files(entries, &terms, self.max_files);
        let directories: Vec<&str> = entries
            .iter()
            .filter(|e| e.get("type").and_then(Value::as_str) == Some("dir"))
            .filter_map(|e| e.get("path").and_then(Value::as_str))
            .collect();

        let mut out = String::new();
        out.push_str("## Repository\n");
        out.push_str(&format!(
            "{}: {} entries at the root ({} directories)\n",
            repo,
            entries.len(),
            directories.len()
        ));

        out.push_str("\n## Relevant Files\n");
        for candidate in &selected {
            if candidate.reasons.is_empty() {
                out.push_str(&format!("- {}\n", candidate.path));
            } else {
                out.push_str(&format!(
                    "- {} ({})\n",
                    candidate.path,
                    candidate.reasons.join("; ")
                ));
            }
        }

        if !directories.is_empty() {
            out.push_str("\n## Directories\n");
            for dir in &directories {
                out.push_str(&format!("- {}/\n", dir));
            }
        }

        out.push_str("\n## Code Snippets\n");
        for candidate in &selected {
            let mut args = Arguments::new();
            args.insert("path".into(), json!(candidate.path));
            let file = tools.call(TOOL_READ_FILE, args).await?;
            match file.get("content").and_then(Value::as_str) {
                Some(content) => {
                    let snippet: Vec<&str> = content.lines().take(SNIPPET_LINES).collect();
                    out.push_str(&format!("### {}\n```\n{}\n```\n", candidate.path, snippet.join("\n")));
                }
                None => {
                    let reason = payload_error(&file).unwrap_or_else(|| "no content".into());
                    out.push_str(&format!("### {}\n(could not be read: {})\n", candidate.path, reason));
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Researcher
// ============================================================================

/// Calls the configured search operation, if the step was given one.
pub struct ResearcherAgent {
    profile: AgentProfile,
}

impl ResearcherAgent {
    pub fn new() -> Self {
        Self {
            profile: prompts::researcher(),
        }
    }
}

impl Default for ResearcherAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn perform(&self, task: &StepTask, tools: &ToolBox<'_>) -> Result<String, AgentError> {
        let Some(search) = tools.names().first().map(|n| n.to_string()) else {
            return Ok(NO_RESEARCH.to_string());
        };

        let analysis = task.output_of(STEP_TASK_ANALYSIS).unwrap_or_default();
        let query = section_text(analysis, "Task Summary")
            .and_then(|s| s.lines().next().map(str::to_string))
            .or_else(|| task.input_str("task_identifier").map(str::to_string))
            .unwrap_or_default();

        let mut args = Arguments::new();
        args.insert("query".into(), json!(format!("best practices: {}", query)));
        let findings = tools.call(&search, args).await?;

        Ok(match findings {
            Value::String(s) => s,
            other => match payload_error(&other) {
                Some(reason) => format!("Research unavailable: {}", reason),
                None => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
            },
        })
    }
}

// ============================================================================
// Planner
// ============================================================================

#[derive(Serialize)]
struct PlanContext<'a> {
    task: &'a str,
    repo: String,
    summary: String,
    incomplete: bool,
    steps: Vec<String>,
    files: Vec<String>,
    acceptance: Vec<String>,
    challenges: Vec<String>,
    research: &'a str,
}

/// Synthesizes the plan from the earlier step outputs. Uses no tools.
pub struct PlannerAgent {
    profile: AgentProfile,
    templates: TemplateEngine,
}

impl PlannerAgent {
    pub fn new() -> Self {
        Self {
            profile: prompts::planner(),
            templates: TemplateEngine::new(),
        }
    }
}

impl Default for PlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn perform(&self, task: &StepTask, _tools: &ToolBox<'_>) -> Result<String, AgentError> {
        let analysis = task.output_of(STEP_TASK_ANALYSIS).unwrap_or_default();
        let code = task.output_of(STEP_CODE_CONTEXT).unwrap_or_default();
        let research = task.output_of(STEP_RESEARCH).unwrap_or(NO_RESEARCH);

        let summary = section_text(analysis, "Task Summary")
            .and_then(|s| s.lines().next().map(str::to_string))
            .unwrap_or_else(|| analysis.lines().next().unwrap_or_default().to_string());

        let files: Vec<String> = section_items(code, "Relevant Files");
        let mut steps: Vec<String> = section_items(analysis, "Requirements")
            .into_iter()
            .map(|r| format!("Implement: {}", r))
            .collect();
        if let Some(first) = files.first() {
            let path = first.split(" (").next().unwrap_or(first);
            steps.insert(0, format!("Read {} and follow its conventions", path));
        }
        steps.push("Add or update tests covering the new behavior".to_string());
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect();

        let context = PlanContext {
            task: task.input_str("task_identifier").unwrap_or("the task"),
            repo: format!(
                "{}/{}",
                task.input_str("owner").unwrap_or_default(),
                task.input_str("repo").unwrap_or_default()
            ),
            summary,
            incomplete: analysis.starts_with(TASK_UNAVAILABLE) || code.starts_with(CODE_UNAVAILABLE),
            steps,
            files,
            acceptance: section_items(analysis, "Acceptance Criteria"),
            challenges: section_items(analysis, "Potential Challenges"),
            research,
        };

        self.templates
            .render(prompts::PLAN_TEMPLATE, &context)
            .map_err(|e| AgentError::Fault(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = "## Task Summary\nENG-1: Retry webhooks\n(state Todo)\n\n## Requirements\n1. Retry failed webhook deliveries\n2. Deliveries should back off exponentially\n\n## Acceptance Criteria\n- [ ] Deliveries should back off exponentially\n\n## Potential Challenges\n- Confirm open questions\n";

    #[test]
    fn test_section_items() {
        assert_eq!(
            section_items(ANALYSIS, "Requirements"),
            vec![
                "Retry failed webhook deliveries",
                "Deliveries should back off exponentially"
            ]
        );
        assert_eq!(
            section_items(ANALYSIS, "Acceptance Criteria"),
            vec!["Deliveries should back off exponentially"]
        );
        assert!(section_items(ANALYSIS, "Missing").is_empty());
    }

    #[test]
    fn test_analyze_issue_structure() {
        let issue = json!({
            "identifier": "ENG-1",
            "title": "Retry webhooks",
            "description": "- Retry failed webhook deliveries\n- Deliveries must back off",
            "state": { "name": "Todo" },
            "priority": 2,
            "comments": { "nodes": [{ "body": "What about DLQ?", "user": { "name": "Bob" } }] }
        });

        let analysis = analyze_issue(&issue);

        assert!(analysis.starts_with("## Task Summary\nENG-1: Retry webhooks"));
        assert_eq!(section_items(&analysis, "Requirements").len(), 2);
        assert_eq!(
            section_items(&analysis, "Acceptance Criteria"),
            vec!["Deliveries must back off"]
        );
        assert!(analysis.contains("Raised by Bob: What about DLQ?"));
    }

    #[test]
    fn test_rank_files_prefers_keyword_matches() {
        let entries = vec![
            json!({ "name": "README.md", "type": "file", "path": "README.md" }),
            json!({ "name": "webhook.rs", "type": "file", "path": "webhook.rs" }),
            json!({ "name": "main.rs", "type": "file", "path": "main.rs" }),
            json!({ "name": "src", "type": "dir", "path": "src" }),
        ];
        let terms = keywords(ANALYSIS);

        let ranked = rank_files(&entries, &terms, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].path, "webhook.rs");
        assert_eq!(ranked[1].path, "README.md");
    }

    #[test]
    fn test_payload_error_reads_both_shapes() {
        assert_eq!(
            payload_error(&json!({ "error": "Status 404", "message": "Not Found" })).as_deref(),
            Some("Status 404 (Not Found)")
        );
        assert_eq!(
            payload_error(&json!({ "errors": [{ "message": "Entity not found" }] })).as_deref(),
            Some("Entity not found")
        );
        assert!(payload_error(&json!({ "data": {} })).is_none());
    }
}
