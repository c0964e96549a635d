// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Planner / Executor / Critic Records
//!
//! Structured outputs exchanged inside one cognitive iteration. The planner
//! and critic outputs derive [`JsonSchema`]: the same schema is handed to the
//! LLM as a hint and used to validate whatever comes back, so an LLM reply is
//! never trusted before it has been checked against it.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::tenant::{MemoryId, OrgId};

/// How the planner and critic produce their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStrategy {
    #[default]
    Heuristic,
    Llm,
}

impl FromStr for AgentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(AgentStrategy::Heuristic),
            "llm" => Ok(AgentStrategy::Llm),
            other => Err(format!("unknown agent strategy: {}", other)),
        }
    }
}

/// Summarised, access-controlled excerpt used as grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCard {
    pub memory_id: MemoryId,
    pub title: String,
    pub excerpt: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub classification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    pub step_id: String,
    pub description: String,
    /// Tool to invoke. A step without a tool is reasoning only and is skipped
    /// by the executor.
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannerOutput {
    pub objective: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub required_tools: Vec<String>,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub stop_conditions: Vec<String>,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Denied,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStepResult {
    pub step_id: String,
    pub tool: Option<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    pub step_results: Vec<ExecutorStepResult>,
    pub overall_status: ExecutionOutcome,
    pub errors: Vec<String>,
}

impl ExecutorOutput {
    pub fn count(&self, status: StepStatus) -> usize {
        self.step_results.iter().filter(|r| r.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CriticEvaluation {
    Pass,
    Fail,
    Retry,
    NeedsEvidence,
}

impl CriticEvaluation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticEvaluation::Pass => "pass",
            CriticEvaluation::Fail => "fail",
            CriticEvaluation::Retry => "retry",
            CriticEvaluation::NeedsEvidence => "needs_evidence",
        }
    }
}

impl fmt::Display for CriticEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CriticIssue {
    /// Short machine-readable category, e.g. `missing_evidence`.
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CriticOutput {
    pub evaluation: CriticEvaluation,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub issues: Vec<CriticIssue>,
    #[serde(default)]
    pub followup_questions: Vec<String>,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

/// Evidence-retrieval collaborator. Relevance ranking lives in the search
/// subsystem; the loop only consumes the returned cards.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn retrieve_evidence(
        &self,
        org_id: OrgId,
        goal: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<EvidenceCard>>;
}
