// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Invoker
//!
//! Single entry point for executing a tool on behalf of an agent. Every
//! attempt, allowed or not, leaves exactly one tool-call log row.
//!
//! Order of gates:
//!
//! 1. Registry lookup (unknown tool denies with method `registry`)
//! 2. Capability pre-check when the context carries a token and a scope
//!    (method `capability`)
//! 3. [`PolicyGuard::authorize`]
//!
//! A denial at any gate returns before the handler is reached.
//!
//! Log shaping follows the tool's [`ToolSensitivity`]: summary mode records
//! only keys and sizes; when persisting is allowed the payload is stored with
//! the listed fields redacted.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::policy_guard::PolicyGuard;
use crate::application::tool_registry::ToolRegistry;
use crate::domain::capability::CapabilityError;
use crate::domain::policy::{PolicyDecision, ToolContext};
use crate::domain::redaction::{redact, summarize};
use crate::domain::repository::RepositoryError;
use crate::domain::session::SessionId;
use crate::domain::tool::{
    InvocationStatus, LogMode, ToolCallId, ToolCallLog, ToolError, ToolInvocationResult,
    ToolSensitivity,
};
use crate::infrastructure::audit::{AuditOutcome, ToolCallAuditLogger};

pub const METHOD_REGISTRY: &str = "registry";
pub const METHOD_CAPABILITY: &str = "capability";

#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("failed to record tool call: {0}")]
    Audit(#[from] RepositoryError),
}

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    guard: Arc<PolicyGuard>,
    audit: Arc<ToolCallAuditLogger>,
}

impl ToolInvoker {
    pub fn new(
        registry: Arc<ToolRegistry>,
        guard: Arc<PolicyGuard>,
        audit: Arc<ToolCallAuditLogger>,
    ) -> Self {
        Self {
            registry,
            guard,
            audit,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Authorize and run one tool call.
    ///
    /// With `swallow_exceptions` a handler or validation failure comes back
    /// as a `failed` result; otherwise it is returned as
    /// [`InvokerError::Tool`] after the failure has been logged.
    pub async fn invoke(
        &self,
        session_id: SessionId,
        iteration_num: u32,
        tool_name: &str,
        input: Map<String, Value>,
        ctx: &ToolContext,
        swallow_exceptions: bool,
    ) -> Result<ToolInvocationResult, InvokerError> {
        let tool_call_id = ToolCallId::new();
        let call = CallRecord {
            tool_call_id,
            session_id,
            iteration_num,
            tool_name,
            ctx,
        };

        let Some(spec) = self.registry.get_spec(tool_name) else {
            let decision = PolicyDecision::deny("tool not registered", METHOD_REGISTRY);
            return self
                .deny(&call, &ToolSensitivity::default(), &input, &decision, Vec::new())
                .await;
        };

        if let Some(token) = &ctx.token {
            // without a scope there is nothing to match, but expiry still holds
            let checked = match ctx.scope {
                Some(scope) => token.validate(scope),
                None if token.is_expired() => Err(CapabilityError::Expired),
                None => Ok(()),
            };
            if let Err(e) = checked {
                let decision = PolicyDecision::deny(e.to_string(), METHOD_CAPABILITY);
                return self
                    .deny(&call, &spec.sensitivity, &input, &decision, Vec::new())
                    .await;
            }
        }

        let decision = self.guard.authorize(&spec, ctx).await;
        let warnings = decision.warnings();
        if !decision.allowed {
            return self
                .deny(&call, &spec.sensitivity, &input, &decision, warnings)
                .await;
        }

        match self.registry.invoke(tool_name, input.clone()).await {
            Ok(output) => {
                let sensitivity = &spec.sensitivity;
                let mut summary = Map::new();
                summary.insert("input".into(), summarize(&input));
                summary.insert("output".into(), summarize(&output));

                let mut payload = Map::new();
                if sensitivity.allow_persist_input {
                    payload.insert(
                        "input".into(),
                        redact(&Value::Object(input), &sensitivity.redacted_input_fields),
                    );
                }
                if sensitivity.allow_persist_output {
                    payload.insert(
                        "output".into(),
                        redact(&Value::Object(output.clone()), &sensitivity.redacted_output_fields),
                    );
                }

                let log = call.log(InvocationStatus::Success, Value::Object(summary), payload);
                self.audit.record(&log, AuditOutcome::Success).await?;
                debug!(tool = %tool_name, tool_call_id = %tool_call_id, "Tool call succeeded");
                Ok(ToolInvocationResult::success(tool_call_id, output, warnings))
            }
            Err(err) => {
                let message = err.to_string();
                let sensitivity = &spec.sensitivity;
                let summary = json!({
                    "input": summarize(&input),
                    "error": message,
                });
                let mut payload = Map::new();
                if sensitivity.allow_persist_input {
                    payload.insert(
                        "input".into(),
                        redact(&Value::Object(input), &sensitivity.redacted_input_fields),
                    );
                }

                let log = call.log(InvocationStatus::Failed, summary, payload);
                self.audit
                    .record(&log, AuditOutcome::Failed { error: &message })
                    .await?;

                if swallow_exceptions {
                    Ok(ToolInvocationResult::failed(tool_call_id, message, warnings))
                } else {
                    Err(InvokerError::Tool(err))
                }
            }
        }
    }

    async fn deny(
        &self,
        call: &CallRecord<'_>,
        sensitivity: &ToolSensitivity,
        input: &Map<String, Value>,
        decision: &PolicyDecision,
        warnings: Vec<String>,
    ) -> Result<ToolInvocationResult, InvokerError> {
        let summary = json!({
            "input": summarize(input),
            "denial_reason": decision.reason,
            "method": decision.method,
        });
        let mut payload = Map::new();
        if sensitivity.allow_persist_input {
            payload.insert(
                "input".into(),
                redact(&Value::Object(input.clone()), &sensitivity.redacted_input_fields),
            );
        }

        let log = call.log(InvocationStatus::Denied, summary, payload);
        self.audit
            .record(
                &log,
                AuditOutcome::Denied {
                    reason: &decision.reason,
                    method: &decision.method,
                },
            )
            .await?;

        info!(
            tool = %call.tool_name,
            tool_call_id = %call.tool_call_id,
            method = %decision.method,
            "Tool handler not invoked"
        );
        Ok(ToolInvocationResult::denied(
            call.tool_call_id,
            decision.reason.clone(),
            warnings,
        ))
    }
}

struct CallRecord<'a> {
    tool_call_id: ToolCallId,
    session_id: SessionId,
    iteration_num: u32,
    tool_name: &'a str,
    ctx: &'a ToolContext,
}

impl CallRecord<'_> {
    /// Persisted mode only when something was allowed into the payload.
    fn log(&self, status: InvocationStatus, summary: Value, payload: Map<String, Value>) -> ToolCallLog {
        let (mode, payload) = if payload.is_empty() {
            (LogMode::Summary, None)
        } else {
            (LogMode::Persisted, Some(Value::Object(payload)))
        };
        ToolCallLog {
            id: self.tool_call_id,
            org_id: self.ctx.org_id,
            session_id: self.session_id,
            iteration_num: self.iteration_num,
            tool_name: self.tool_name.to_string(),
            status,
            mode,
            summary,
            payload,
            created_at: Utc::now(),
        }
    }
}
