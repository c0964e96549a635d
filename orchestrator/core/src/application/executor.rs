// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Executor Agent
//!
//! Runs plan steps in order through the [`ToolInvoker`]. A denied or failed
//! step never stops the remaining steps; its outcome is captured per step.
//! Only a failure to record a tool call (storage) aborts execution.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::tool_invoker::{InvokerError, ToolInvoker};
use crate::domain::agents::{ExecutionOutcome, ExecutorOutput, ExecutorStepResult, PlanStep, PlannerOutput, StepStatus};
use crate::domain::policy::ToolContext;
use crate::domain::session::SessionId;
use crate::domain::tool::InvocationStatus;

pub struct ExecutorAgent {
    invoker: Arc<ToolInvoker>,
}

impl ExecutorAgent {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }

    /// Names of the tools plans may reference.
    pub fn available_tools(&self) -> Vec<String> {
        self.invoker.registry().names()
    }

    pub async fn execute(
        &self,
        session_id: SessionId,
        iteration_num: u32,
        plan: &PlannerOutput,
        ctx: &ToolContext,
    ) -> Result<ExecutorOutput, InvokerError> {
        let mut step_results = Vec::with_capacity(plan.steps.len());
        let mut errors = Vec::new();

        for step in &plan.steps {
            let result = self.run_step(session_id, iteration_num, step, ctx).await?;
            if let Some(error) = &result.error {
                errors.push(format!("{}: {}", step.step_id, error));
            }
            step_results.push(result);
        }

        let overall_status = overall_status(&step_results);
        info!(
            session_id = %session_id,
            iteration = iteration_num,
            steps = step_results.len(),
            status = ?overall_status,
            "Plan executed"
        );
        Ok(ExecutorOutput {
            step_results,
            overall_status,
            errors,
        })
    }

    async fn run_step(
        &self,
        session_id: SessionId,
        iteration_num: u32,
        step: &PlanStep,
        ctx: &ToolContext,
    ) -> Result<ExecutorStepResult, InvokerError> {
        let Some(tool) = &step.tool else {
            debug!(step_id = %step.step_id, "Step has no tool, skipping");
            return Ok(ExecutorStepResult {
                step_id: step.step_id.clone(),
                tool: None,
                status: StepStatus::Skipped,
                output: None,
                error: None,
                warnings: Vec::new(),
            });
        };

        let input = step_input(step);
        let result = self
            .invoker
            .invoke(session_id, iteration_num, tool, input, ctx, true)
            .await?;

        let (status, error) = match result.status {
            InvocationStatus::Success => (StepStatus::Success, None),
            InvocationStatus::Denied => (StepStatus::Denied, result.denial_reason),
            InvocationStatus::Failed => (StepStatus::Failed, result.error),
            InvocationStatus::Skipped => (StepStatus::Skipped, None),
        };
        Ok(ExecutorStepResult {
            step_id: step.step_id.clone(),
            tool: Some(tool.clone()),
            status,
            output: result.output,
            error,
            warnings: result.warnings,
        })
    }
}

/// Non-object tool input is wrapped as `{"value": ...}`.
fn step_input(step: &PlanStep) -> Map<String, Value> {
    match &step.tool_input {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// `failed` if any step failed, else `partial` if any was denied, else
/// `success`.
pub fn overall_status(results: &[ExecutorStepResult]) -> ExecutionOutcome {
    if results.iter().any(|r| r.status == StepStatus::Failed) {
        ExecutionOutcome::Failed
    } else if results.iter().any(|r| r.status == StepStatus::Denied) {
        ExecutionOutcome::Partial
    } else {
        ExecutionOutcome::Success
    }
}
