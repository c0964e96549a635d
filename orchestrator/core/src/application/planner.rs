// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Planner Agent
//!
//! Turns a goal plus evidence into a [`PlannerOutput`].
//!
//! The heuristic plan is also the fallback for the LLM path: a reply that is
//! empty, fails the schema, or references no usable structure is discarded
//! and the heuristic plan returned instead. Unvalidated structure is never
//! passed on.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::prompts::PromptTemplateEngine;
use crate::application::structured_output::StructuredOutput;
use crate::domain::agents::{AgentStrategy, EvidenceCard, PlanStep, PlannerOutput};
use crate::domain::llm::{CompletionObserver, JsonCompletionClient};
use crate::domain::self_model::{evidence_limit, SelfModel};

/// Confidence reported by the heuristic plan.
pub const HEURISTIC_CONFIDENCE: f64 = 0.25;

pub struct PlannerAgent {
    strategy: AgentStrategy,
    llm: Option<Arc<dyn JsonCompletionClient>>,
    observer: Option<Arc<dyn CompletionObserver>>,
    prompts: PromptTemplateEngine,
    output: StructuredOutput<PlannerOutput>,
    base_evidence_limit: usize,
    evidence_tool: String,
}

impl PlannerAgent {
    pub fn heuristic(base_evidence_limit: usize, evidence_tool: impl Into<String>) -> Self {
        Self {
            strategy: AgentStrategy::Heuristic,
            llm: None,
            observer: None,
            prompts: PromptTemplateEngine::new(),
            output: StructuredOutput::new(),
            base_evidence_limit,
            evidence_tool: evidence_tool.into(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn JsonCompletionClient>) -> Self {
        self.strategy = AgentStrategy::Llm;
        self.llm = Some(llm);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CompletionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn strategy(&self) -> AgentStrategy {
        self.strategy
    }

    pub async fn plan(
        &self,
        goal: &str,
        evidence: &[EvidenceCard],
        available_tools: &[String],
        self_model: Option<&SelfModel>,
    ) -> PlannerOutput {
        let llm = match (&self.llm, self.strategy) {
            (Some(llm), AgentStrategy::Llm) if !goal.trim().is_empty() => llm,
            _ => return self.heuristic_plan(goal, available_tools, self_model),
        };

        let prompt = match self
            .prompts
            .render_planner(goal, evidence, available_tools, self_model)
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Planner prompt rendering failed, using heuristic plan");
                return self.heuristic_plan(goal, available_tools, self_model);
            }
        };

        let reply = llm
            .complete_json(&prompt, self.output.schema(), self.observer.as_deref())
            .await;
        match self.output.decode(reply) {
            Ok(plan) => {
                debug!(steps = plan.steps.len(), confidence = plan.confidence, "LLM plan accepted");
                plan
            }
            Err(errors) => {
                warn!(errors = ?errors, "LLM plan rejected, using heuristic plan");
                self.heuristic_plan(goal, available_tools, self_model)
            }
        }
    }

    /// Conservative retrieval-first plan.
    pub fn heuristic_plan(
        &self,
        goal: &str,
        available_tools: &[String],
        self_model: Option<&SelfModel>,
    ) -> PlannerOutput {
        let limit = evidence_limit(self.base_evidence_limit, self_model);
        let tool = available_tools
            .iter()
            .any(|t| t == &self.evidence_tool)
            .then(|| self.evidence_tool.clone());

        let mut steps = vec![PlanStep {
            step_id: "step-1".to_string(),
            description: "Retrieve evidence relevant to the goal".to_string(),
            tool: tool.clone(),
            tool_input: Some(json!({ "query": goal, "limit": limit })),
        }];

        let domains = self_model
            .map(|m| m.low_confidence_domains.as_slice())
            .unwrap_or_default();
        if !domains.is_empty() {
            steps.push(PlanStep {
                step_id: "step-2".to_string(),
                description: format!(
                    "Gather more evidence for low-confidence domains: {}",
                    domains.join(", ")
                ),
                tool: tool.clone(),
                tool_input: Some(json!({
                    "query": format!("{} {}", goal, domains.join(" ")).trim(),
                    "limit": limit,
                })),
            });
        }

        PlannerOutput {
            objective: goal.to_string(),
            assumptions: vec!["Retrieved evidence is sufficient grounding".to_string()],
            constraints: vec![format!("Retrieve at most {} evidence items per step", limit)],
            required_tools: tool.into_iter().collect(),
            steps,
            stop_conditions: vec!["Critic evaluation is pass".to_string()],
            confidence: HEURISTIC_CONFIDENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tokio::sync::Mutex;

    struct ScriptedLlm {
        replies: Mutex<Vec<Value>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JsonCompletionClient for ScriptedLlm {
        async fn complete_json(
            &self,
            prompt: &str,
            _schema_hint: &Value,
            _observer: Option<&dyn CompletionObserver>,
        ) -> Map<String, Value> {
            self.prompts.lock().await.push(prompt.to_string());
            let mut replies = self.replies.lock().await;
            if replies.is_empty() {
                return Map::new();
            }
            replies.remove(0).as_object().cloned().unwrap_or_default()
        }
    }

    fn tools() -> Vec<String> {
        vec!["memory.search".to_string()]
    }

    #[tokio::test]
    async fn test_heuristic_plan_scales_limit() {
        let planner = PlannerAgent::heuristic(10, "memory.search");
        let model = SelfModel {
            recommended_evidence_multiplier: 2.0,
            ..SelfModel::default()
        };
        let plan = planner.plan("who owns billing", &[], &tools(), Some(&model)).await;

        assert_eq!(plan.confidence, HEURISTIC_CONFIDENCE);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool.as_deref(), Some("memory.search"));
        assert_eq!(plan.steps[0].tool_input.as_ref().unwrap()["limit"], 20);
    }

    #[tokio::test]
    async fn test_heuristic_limit_is_clamped() {
        let planner = PlannerAgent::heuristic(25, "memory.search");
        let model = SelfModel {
            recommended_evidence_multiplier: 9.0,
            ..SelfModel::default()
        };
        let plan = planner.heuristic_plan("g", &tools(), Some(&model));
        // 25 * 3 clamped to 30
        assert_eq!(plan.steps[0].tool_input.as_ref().unwrap()["limit"], 30);
    }

    #[tokio::test]
    async fn test_low_confidence_domains_add_step() {
        let planner = PlannerAgent::heuristic(10, "memory.search");
        let model = SelfModel {
            low_confidence_domains: vec!["billing".into()],
            ..SelfModel::default()
        };
        let plan = planner.heuristic_plan("owner", &tools(), Some(&model));
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[1].description.contains("billing"));
    }

    #[tokio::test]
    async fn test_missing_evidence_tool_leaves_step_toolless() {
        let planner = PlannerAgent::heuristic(10, "memory.search");
        let plan = planner.heuristic_plan("g", &[], None);
        assert!(plan.steps[0].tool.is_none());
        assert!(plan.required_tools.is_empty());
    }

    #[tokio::test]
    async fn test_llm_plan_accepted_when_valid() {
        let llm = ScriptedLlm::new(vec![serde_json::json!({
            "objective": "find the billing owner",
            "steps": [{"step_id": "s1", "description": "search", "tool": "memory.search",
                       "tool_input": {"query": "billing owner"}}],
            "confidence": 0.7
        })]);
        let planner = PlannerAgent::heuristic(10, "memory.search").with_llm(llm.clone());
        let plan = planner.plan("who owns billing", &[], &tools(), None).await;

        assert_eq!(plan.objective, "find the billing owner");
        assert_eq!(plan.confidence, 0.7);
        assert!(llm.prompts.lock().await[0].contains("who owns billing"));
    }

    #[tokio::test]
    async fn test_invalid_llm_plan_falls_back() {
        let llm = ScriptedLlm::new(vec![
            serde_json::json!({"objective": "x", "steps": "not a list", "confidence": 0.9}),
        ]);
        let planner = PlannerAgent::heuristic(10, "memory.search").with_llm(llm);
        let plan = planner.plan("g", &[], &tools(), None).await;
        assert_eq!(plan.confidence, HEURISTIC_CONFIDENCE);

        // empty map (client failure) also falls back
        let llm = ScriptedLlm::new(vec![]);
        let planner = PlannerAgent::heuristic(10, "memory.search").with_llm(llm);
        assert_eq!(planner.plan("g", &[], &tools(), None).await.confidence, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_empty_goal_skips_llm() {
        let llm = ScriptedLlm::new(vec![]);
        let planner = PlannerAgent::heuristic(10, "memory.search").with_llm(llm.clone());
        planner.plan("  ", &[], &tools(), None).await;
        assert!(llm.prompts.lock().await.is_empty());
    }
}
