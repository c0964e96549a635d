// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agents::CriticEvaluation;
use crate::domain::belief::Revision;
use crate::domain::process::{ProcessId, ProcessStatus};
use crate::domain::session::{FinalDecision, SessionId, SessionStatus};
use crate::domain::tenant::{MemoryId, OrgId};
use crate::domain::tool::ToolCallId;

/// Cognitive loop lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionStarted {
        session_id: SessionId,
        org_id: OrgId,
        goal: String,
        started_at: DateTime<Utc>,
    },
    IterationCompleted {
        session_id: SessionId,
        iteration_num: u32,
        evaluation: CriticEvaluation,
        confidence: f64,
        completed_at: DateTime<Utc>,
    },
    SessionFinished {
        session_id: SessionId,
        status: SessionStatus,
        iterations: u32,
        finished_at: DateTime<Utc>,
    },
    ReportGenerated {
        session_id: SessionId,
        final_decision: FinalDecision,
        generated_at: DateTime<Utc>,
    },
}

/// Policy-relevant tool call outcomes. Successful calls are not broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolCallEvent {
    ToolCallDenied {
        tool_call_id: ToolCallId,
        session_id: SessionId,
        tool_name: String,
        reason: String,
        method: String,
        denied_at: DateTime<Utc>,
    },
    ToolCallFailed {
        tool_call_id: ToolCallId,
        session_id: SessionId,
        tool_name: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerEvent {
    ProcessEnqueued {
        process_id: ProcessId,
        org_id: OrgId,
        agent_name: String,
        priority: i32,
        enqueued_at: DateTime<Utc>,
    },
    ProcessDispatched {
        process_id: ProcessId,
        org_id: OrgId,
        attempt: u32,
        dispatched_at: DateTime<Utc>,
    },
    ProcessFinished {
        process_id: ProcessId,
        org_id: OrgId,
        status: ProcessStatus,
        reason: Option<String>,
        finished_at: DateTime<Utc>,
    },
    ProcessRequeued {
        process_id: ProcessId,
        org_id: OrgId,
        reason: Option<String>,
        requeued_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BeliefEvent {
    BeliefRevised {
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: String,
        revision: Revision,
        confidence: f64,
        revised_at: DateTime<Utc>,
    },
}
