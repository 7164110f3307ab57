// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Step Template Engine
//!
//! Renders pipeline step descriptions with Handlebars.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn step templates into the task text handed to an agent
//!
//! # Available Placeholders
//!
//! - `{{inputs.<key>}}` - pipeline input supplied by the caller
//! - `{{steps.<name>}}` - output of an earlier step
//! - `{{agent.role}}`, `{{agent.goal}}` - profile of the agent running the step
//!
//! Output is plain text: HTML escaping is disabled and missing variables render
//! as empty strings.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::application::agent::{AgentProfile, StepOutput};

#[derive(Debug, Clone, Serialize)]
pub struct StepTemplateContext<'a> {
    pub inputs: &'a Value,
    pub steps: BTreeMap<&'a str, &'a str>,
    pub agent: &'a AgentProfile,
}

impl<'a> StepTemplateContext<'a> {
    pub fn new(inputs: &'a Value, previous: &'a [StepOutput], agent: &'a AgentProfile) -> Self {
        Self {
            inputs,
            steps: previous
                .iter()
                .map(|o| (o.step.as_str(), o.output.as_str()))
                .collect(),
            agent,
        }
    }
}

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render step template")
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_renders_inputs_and_prior_steps() {
        let engine = TemplateEngine::new();
        let inputs = json!({ "task_identifier": "ENG-42" });
        let previous = vec![StepOutput {
            step: "task_analysis".into(),
            output: "Add <retry> & backoff".into(),
        }];
        let agent = AgentProfile::new("Planner", "Plan");
        let context = StepTemplateContext::new(&inputs, &previous, &agent);

        let text = engine
            .render(
                "{{agent.role}} for {{inputs.task_identifier}}: {{steps.task_analysis}}",
                &context,
            )
            .unwrap();

        assert_eq!(text, "Planner for ENG-42: Add <retry> & backoff");
    }

    #[test]
    fn test_missing_values_render_empty() {
        let engine = TemplateEngine::new();
        let inputs = json!({});
        let agent = AgentProfile::new("Analyst", "Analyze");
        let context = StepTemplateContext::new(&inputs, &[], &agent);

        assert_eq!(engine.render("[{{steps.none}}]", &context).unwrap(), "[]");
    }

    #[test]
    fn test_validate_template() {
        let engine = TemplateEngine::new();
        assert!(engine.validate_template("{{#if x}}ok{{/if}}").is_ok());
        assert!(engine.validate_template("{{#if x}}unclosed").is_err());
    }
}
