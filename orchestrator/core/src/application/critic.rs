// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Critic Agent
//!
//! Evaluates one iteration. Without an LLM, or when the LLM reply does not
//! validate, the critic fails closed: `needs_evidence` at low confidence. It
//! never passes an iteration it could not actually assess.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::prompts::PromptTemplateEngine;
use crate::application::structured_output::StructuredOutput;
use crate::domain::agents::{
    AgentStrategy, CriticEvaluation, CriticIssue, CriticOutput, EvidenceCard, ExecutorOutput,
    PlannerOutput,
};
use crate::domain::llm::{CompletionObserver, JsonCompletionClient};

pub const FAIL_CLOSED_CONFIDENCE: f64 = 0.25;

pub struct CriticAgent {
    strategy: AgentStrategy,
    llm: Option<Arc<dyn JsonCompletionClient>>,
    observer: Option<Arc<dyn CompletionObserver>>,
    prompts: PromptTemplateEngine,
    output: StructuredOutput<CriticOutput>,
}

impl CriticAgent {
    pub fn heuristic() -> Self {
        Self {
            strategy: AgentStrategy::Heuristic,
            llm: None,
            observer: None,
            prompts: PromptTemplateEngine::new(),
            output: StructuredOutput::new(),
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

    pub async fn critique(
        &self,
        goal: &str,
        plan: &PlannerOutput,
        execution: &ExecutorOutput,
        evidence: &[EvidenceCard],
        simulation: Option<&serde_json::Value>,
    ) -> CriticOutput {
        let llm = match (&self.llm, self.strategy) {
            (Some(llm), AgentStrategy::Llm) => llm,
            _ => return fail_closed(),
        };

        let prompt = match self
            .prompts
            .render_critic(goal, plan, execution, evidence, simulation)
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Critic prompt rendering failed, failing closed");
                return fail_closed();
            }
        };

        let reply = llm
            .complete_json(&prompt, self.output.schema(), self.observer.as_deref())
            .await;
        match self.output.decode(reply) {
            Ok(critique) => {
                debug!(evaluation = %critique.evaluation, confidence = critique.confidence, "Critique accepted");
                critique
            }
            Err(errors) => {
                warn!(errors = ?errors, "Critique rejected, failing closed");
                fail_closed()
            }
        }
    }
}

/// Verdict used whenever the iteration could not be assessed.
pub fn fail_closed() -> CriticOutput {
    CriticOutput {
        evaluation: CriticEvaluation::NeedsEvidence,
        strengths: Vec::new(),
        issues: vec![CriticIssue {
            kind: "missing_evidence".to_string(),
            detail: "The result could not be verified against sufficient evidence".to_string(),
        }],
        followup_questions: vec!["What additional evidence would confirm or refute this result?".to_string()],
        confidence: FAIL_CLOSED_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agents::ExecutionOutcome;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct FixedLlm(Value);

    #[async_trait]
    impl JsonCompletionClient for FixedLlm {
        async fn complete_json(
            &self,
            _prompt: &str,
            _schema_hint: &Value,
            _observer: Option<&dyn CompletionObserver>,
        ) -> Map<String, Value> {
            self.0.as_object().cloned().unwrap_or_default()
        }
    }

    fn plan() -> PlannerOutput {
        PlannerOutput {
            objective: "o".into(),
            assumptions: vec![],
            constraints: vec![],
            required_tools: vec![],
            steps: vec![],
            stop_conditions: vec![],
            confidence: 0.5,
        }
    }

    fn execution() -> ExecutorOutput {
        ExecutorOutput {
            step_results: vec![],
            overall_status: ExecutionOutcome::Success,
            errors: vec![],
        }
    }

    #[tokio::test]
    async fn test_heuristic_critic_fails_closed() {
        let out = CriticAgent::heuristic().critique("g", &plan(), &execution(), &[], None).await;
        assert_eq!(out.evaluation, CriticEvaluation::NeedsEvidence);
        assert_eq!(out.confidence, FAIL_CLOSED_CONFIDENCE);
        assert_eq!(out.issues[0].kind, "missing_evidence");
        assert_eq!(out.followup_questions.len(), 1);
    }

    #[tokio::test]
    async fn test_valid_llm_critique_used() {
        let critic = CriticAgent::heuristic().with_llm(Arc::new(FixedLlm(json!({
            "evaluation": "pass",
            "strengths": ["grounded"],
            "confidence": 0.85
        }))));
        let out = critic.critique("g", &plan(), &execution(), &[], None).await;
        assert_eq!(out.evaluation, CriticEvaluation::Pass);
        assert_eq!(out.strengths, vec!["grounded".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_or_empty_llm_critique_fails_closed() {
        for reply in [json!({"evaluation": "pass"}), json!({}), json!({"evaluation": "ok", "confidence": 0.9})] {
            let critic = CriticAgent::heuristic().with_llm(Arc::new(FixedLlm(reply)));
            let out = critic.critique("g", &plan(), &execution(), &[], None).await;
            assert_eq!(out, fail_closed());
        }
    }
}
