// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool-Call Audit Logger
//!
//! Persists one [`ToolCallLog`] per invocation attempt and mirrors
//! policy-relevant outcomes onto the structured log, the metrics recorder and
//! the [`EventBus`].
//!
//! | Outcome | Log level | Event |
//! |---------|-----------|-------|
//! | success | `debug` | none |
//! | denied | `warn` | `ToolCallDenied` |
//! | failed | `warn` | `ToolCallFailed` |

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::events::ToolCallEvent;
use crate::domain::repository::{RepositoryError, ToolCallLogRepository};
use crate::domain::tool::{InvocationStatus, ToolCallLog};
use crate::infrastructure::event_bus::EventBus;

/// What happened, beyond what the log row itself records.
#[derive(Debug, Clone, Copy)]
pub enum AuditOutcome<'a> {
    Success,
    Denied { reason: &'a str, method: &'a str },
    Failed { error: &'a str },
    Skipped,
}

pub struct ToolCallAuditLogger {
    logs: Arc<dyn ToolCallLogRepository>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolCallAuditLogger {
    pub fn new(logs: Arc<dyn ToolCallLogRepository>) -> Self {
        Self {
            logs,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Persist the row first; a storage failure propagates and nothing is
    /// published for it.
    pub async fn record(&self, log: &ToolCallLog, outcome: AuditOutcome<'_>) -> Result<(), RepositoryError> {
        self.logs.create(log).await?;

        metrics::counter!("aegis_tool_invocations_total", "status" => log.status.as_str()).increment(1);

        match outcome {
            AuditOutcome::Success | AuditOutcome::Skipped => {
                debug!(
                    tool_call_id = %log.id,
                    tool = %log.tool_name,
                    status = %log.status,
                    mode = ?log.mode,
                    "Tool call recorded"
                );
            }
            AuditOutcome::Denied { reason, method } => {
                warn!(
                    tool_call_id = %log.id,
                    tool = %log.tool_name,
                    session_id = %log.session_id,
                    method = %method,
                    reason = %reason,
                    "Tool call denied"
                );
                self.publish(ToolCallEvent::ToolCallDenied {
                    tool_call_id: log.id,
                    session_id: log.session_id,
                    tool_name: log.tool_name.clone(),
                    reason: reason.to_string(),
                    method: method.to_string(),
                    denied_at: Utc::now(),
                });
            }
            AuditOutcome::Failed { error } => {
                warn!(
                    tool_call_id = %log.id,
                    tool = %log.tool_name,
                    session_id = %log.session_id,
                    error = %error,
                    "Tool call failed"
                );
                self.publish(ToolCallEvent::ToolCallFailed {
                    tool_call_id: log.id,
                    session_id: log.session_id,
                    tool_name: log.tool_name.clone(),
                    error: error.to_string(),
                    failed_at: Utc::now(),
                });
            }
        }
        Ok(())
    }

    pub async fn count(
        &self,
        session_id: crate::domain::session::SessionId,
        status: InvocationStatus,
    ) -> Result<usize, RepositoryError> {
        self.logs.count_by_status(session_id, status).await
    }

    fn publish(&self, event: ToolCallEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_tool_call_event(event);
        }
    }
}
