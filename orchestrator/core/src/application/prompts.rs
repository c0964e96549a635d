// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Handlebars rendering for the LLM-backed planner and critic. Templates are
//! plain text (no HTML escaping) and non-strict, so absent optional fields
//! render as empty.
//!
//! # Placeholders
//!
//! - `{{goal}}` - the session goal
//! - `{{#each evidence}}` - evidence cards (`title`, `excerpt`, `memory_id`)
//! - `{{#each tools}}` - available tool names (planner)
//! - `{{self_model}}` - pretty JSON self-model summary, if any
//! - `{{plan}}`, `{{execution}}`, `{{simulation}}` - pretty JSON (critic)

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::agents::{EvidenceCard, ExecutorOutput, PlannerOutput};
use crate::domain::self_model::SelfModel;

pub const PLANNER_TEMPLATE: &str = "\
You are the planning agent of a memory-grounded assistant.

Goal: {{goal}}

{{#if evidence}}Evidence:
{{#each evidence}}- [{{memory_id}}] {{title}}: {{excerpt}}
{{/each}}{{else}}No evidence was retrieved.
{{/if}}
Available tools: {{#each tools}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
{{#if self_model}}
Self-model:
{{self_model}}
{{/if}}
Produce a plan: objective, assumptions, constraints, required_tools, ordered steps \
(each with step_id, description and optionally tool and tool_input), stop_conditions \
and a confidence between 0 and 1. Only use listed tools.";

pub const CRITIC_TEMPLATE: &str = "\
You are the critic agent reviewing one iteration toward a goal.

Goal: {{goal}}

Plan:
{{plan}}

Execution:
{{execution}}
{{#if evidence}}
Evidence:
{{#each evidence}}- [{{memory_id}}] {{title}}: {{excerpt}}
{{/each}}{{/if}}{{#if simulation}}
Simulation:
{{simulation}}
{{/if}}
Evaluate with one of pass, fail, retry, needs_evidence. List strengths, issues \
(kind and detail), follow-up questions and a confidence between 0 and 1.";

#[derive(Debug, Serialize)]
struct PlannerPromptContext<'a> {
    goal: &'a str,
    evidence: &'a [EvidenceCard],
    tools: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    self_model: Option<String>,
}

#[derive(Debug, Serialize)]
struct CriticPromptContext<'a> {
    goal: &'a str,
    plan: String,
    execution: String,
    evidence: &'a [EvidenceCard],
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<String>,
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    pub fn render_planner(
        &self,
        goal: &str,
        evidence: &[EvidenceCard],
        tools: &[String],
        self_model: Option<&SelfModel>,
    ) -> Result<String> {
        let self_model = self_model
            .map(serde_json::to_string_pretty)
            .transpose()
            .context("Failed to serialize self-model")?;
        self.render(
            PLANNER_TEMPLATE,
            &PlannerPromptContext {
                goal,
                evidence,
                tools,
                self_model,
            },
        )
    }

    pub fn render_critic(
        &self,
        goal: &str,
        plan: &PlannerOutput,
        execution: &ExecutorOutput,
        evidence: &[EvidenceCard],
        simulation: Option<&serde_json::Value>,
    ) -> Result<String> {
        self.render(
            CRITIC_TEMPLATE,
            &CriticPromptContext {
                goal,
                plan: serde_json::to_string_pretty(plan)?,
                execution: serde_json::to_string_pretty(execution)?,
                evidence,
                simulation: simulation.map(serde_json::to_string_pretty).transpose()?,
            },
        )
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
