// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Step descriptions, expected outputs and agent profiles of the research
//! pipeline. Descriptions are Handlebars templates rendered by the
//! orchestrator against `inputs`, `steps` and `agent`.

use crate::application::agent::AgentProfile;

pub const TASK_ANALYSIS_DESCRIPTION: &str = "\
Analyze the tracker task '{{inputs.task_identifier}}' and work out:

1. What is being asked for (the core feature or fix)
2. Specific requirements stated in the task
3. Acceptance criteria, explicit or implied
4. Dependencies or blockers
5. Useful context from comments or linked items

Fetch the task with the get_linear_task tool.";

pub const TASK_ANALYSIS_EXPECTED: &str = "\
A structured analysis with a short task summary, a numbered requirements list, \
an acceptance criteria checklist and the challenges worth flagging.";

pub const CODE_CONTEXT_DESCRIPTION: &str = "\
Using this task analysis:

{{steps.task_analysis}}

Explore {{inputs.owner}}/{{inputs.repo}} to find the files most relevant to the \
task, the patterns and conventions to follow, the code the change must \
integrate with and the test layout. Start from the root with \
get_repo_structure and open promising files with read_file.";

pub const CODE_CONTEXT_EXPECTED: &str = "\
A code context report listing relevant files with their purpose, key snippets, \
integration points and test patterns.";

pub const RESEARCH_DESCRIPTION: &str = "\
For this task:

{{steps.task_analysis}}

Look up documentation, comparable implementations, common pitfalls and testing \
strategies that would help implement it.";

pub const RESEARCH_EXPECTED: &str = "\
Research findings: recommended practices with rationale, pitfalls to avoid and \
testing advice.";

pub const PLAN_DESCRIPTION: &str = "\
Write an implementation plan for {{inputs.task_identifier}} in \
{{inputs.owner}}/{{inputs.repo}} from:

## Task Analysis
{{steps.task_analysis}}

## Code Context
{{steps.code_context}}

## Research Findings
{{steps.research}}

Cover prerequisites, numbered implementation steps naming the files to touch, \
a testing plan, edge cases and gotchas. A developer should be able to follow \
it without further questions.";

pub const PLAN_EXPECTED: &str = "\
A plan with Summary, Prerequisites, Implementation Steps, Files to Create/Modify, \
Testing Plan, Edge Cases and Potential Gotchas sections.";

/// Layout of the planner's output.
pub const PLAN_TEMPLATE: &str = "\
## Summary
Implementation plan for {{task}} in {{repo}}: {{summary}}

## Prerequisites
- Create a feature branch in {{repo}} from the default branch.
{{#if incomplete}}- Restore access to the tracker and repository host; parts of this plan were drafted without them.
{{/if}}
## Implementation Steps
{{#each steps}}{{this}}
{{/each}}
## Files to Create/Modify
{{#each files}}- {{this}}
{{else}}- No specific files identified; start from the repository root structure.
{{/each}}
## Testing Plan
{{#each acceptance}}- Verify: {{this}}
{{/each}}- Add unit tests next to the code that changes and run the existing suite.

## Edge Cases
{{#each challenges}}- {{this}}
{{else}}- Empty or missing input data in the new code paths.
{{/each}}
## Potential Gotchas
{{#if incomplete}}- Some inputs could not be fetched while planning; revisit the plan once authorization is complete.
{{/if}}- Follow the conventions visible in the code context before introducing new patterns.

## Research Notes
{{research}}
";

pub fn task_analyst() -> AgentProfile {
    AgentProfile::new(
        "Task Requirements Analyst",
        "Turn tracker tasks into clear, actionable requirements",
    )
    .with_backstory(
        "Product analyst who breaks technical tasks into requirements, spots implicit \
         expectations and always names acceptance criteria, edge cases and blockers.",
    )
}

pub fn code_analyst() -> AgentProfile {
    AgentProfile::new(
        "Codebase Analyst",
        "Find the code, patterns and conventions in the repository that a task touches",
    )
    .with_backstory(
        "Senior engineer who reads unfamiliar codebases quickly and explains how new \
         code should fit the existing architecture.",
    )
}

pub fn researcher() -> AgentProfile {
    AgentProfile::new(
        "Technical Researcher",
        "Find practices and prior art relevant to the implementation task",
    )
    .with_backstory(
        "Researcher who keeps up with current practice and condenses documentation \
         and examples into recommendations.",
    )
}

pub fn planner() -> AgentProfile {
    AgentProfile::new(
        "Implementation Planner",
        "Produce a detailed, actionable implementation plan from the research",
    )
    .with_backstory(
        "Technical lead who turns analysis into step-by-step plans and keeps testing, \
         edge cases and pitfalls in view.",
    )
}
