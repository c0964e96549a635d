// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cognitive Session Aggregate
//!
//! A [`CognitiveSession`] tracks one agent working toward one goal through a
//! sequence of plan → execute → critique iterations. The session is the
//! aggregate root; [`CognitiveIteration`] rows and the terminal
//! [`EvaluationReport`] hang off it.
//!
//! ## State Machine
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Running` | `Succeeded` | critic returned `pass` |
//! | `Running` | `Failed` | `max_iterations` exhausted |
//! | `Running` | `Aborted` | explicit abort |
//!
//! Terminal states are final. Any other transition is a [`SessionError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::domain::agents::CriticEvaluation;
use crate::domain::tenant::{MemoryId, OrgId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session {session_id} is already {status}")]
    AlreadyTerminal {
        session_id: SessionId,
        status: SessionStatus,
    },

    #[error("invalid session transition to {0}")]
    InvalidTransition(SessionStatus),

    #[error("goal must not be empty")]
    EmptyGoal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveSession {
    pub id: SessionId,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub goal: String,
    pub goal_id: Option<Uuid>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CognitiveSession {
    pub fn new(
        org_id: OrgId,
        user_id: UserId,
        goal: impl Into<String>,
        goal_id: Option<Uuid>,
    ) -> Result<Self, SessionError> {
        let goal = goal.into();
        if goal.trim().is_empty() {
            return Err(SessionError::EmptyGoal);
        }
        let now = Utc::now();
        Ok(Self {
            id: SessionId::new(),
            org_id,
            user_id,
            goal,
            goal_id,
            status: SessionStatus::Running,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn mark_succeeded(&mut self) -> Result<(), SessionError> {
        self.transition(SessionStatus::Succeeded)
    }

    pub fn mark_failed(&mut self) -> Result<(), SessionError> {
        self.transition(SessionStatus::Failed)
    }

    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.transition(SessionStatus::Aborted)
    }

    /// Bump `updated_at` after an iteration is recorded.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, to: SessionStatus) -> Result<(), SessionError> {
        if !to.is_terminal() {
            return Err(SessionError::InvalidTransition(to));
        }
        if self.status.is_terminal() {
            return Err(SessionError::AlreadyTerminal {
                session_id: self.id,
                status: self.status,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    /// Critic confidence for this iteration.
    pub confidence: f64,
    pub planner_confidence: f64,
    pub evidence_count: usize,
    pub denied_steps: usize,
    pub failed_steps: usize,
    pub duration_ms: u64,
}

/// One persisted plan → execute → critique pass. `iteration_num` starts at 1
/// and there is at most one row per number per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveIteration {
    pub session_id: SessionId,
    pub iteration_num: u32,
    pub plan_json: Value,
    pub execution_json: Value,
    pub critique_json: Value,
    pub evaluation: CriticEvaluation,
    pub metrics: IterationMetrics,
    pub evidence_memory_ids: Vec<MemoryId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalDecision {
    Pass,
    Fail,
    NeedsEvidence,
    Contested,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::Pass => "pass",
            FinalDecision::Fail => "fail",
            FinalDecision::NeedsEvidence => "needs_evidence",
            FinalDecision::Contested => "contested",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub avg_confidence: f64,
    pub policy_denials: usize,
    pub tool_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal summary of a session. One authoritative report per session
/// unless regeneration is forced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub id: ReportId,
    pub session_id: SessionId,
    pub org_id: OrgId,
    pub final_decision: FinalDecision,
    pub evidence_memory_ids: Vec<MemoryId>,
    pub quality_metrics: QualityMetrics,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CognitiveSession {
        CognitiveSession::new(OrgId::new(), UserId::new(), "summarise incident", None).unwrap()
    }

    #[test]
    fn test_new_session_is_running() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Running);
        assert!(!s.status.is_terminal());
    }

    #[test]
    fn test_empty_goal_rejected() {
        let result = CognitiveSession::new(OrgId::new(), UserId::new(), "   ", None);
        assert_eq!(result.unwrap_err(), SessionError::EmptyGoal);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut s = session();
        s.mark_succeeded().unwrap();
        assert_eq!(s.status, SessionStatus::Succeeded);

        assert!(matches!(
            s.mark_failed(),
            Err(SessionError::AlreadyTerminal { status: SessionStatus::Succeeded, .. })
        ));
        assert!(s.abort().is_err());
    }

    #[test]
    fn test_abort_from_running() {
        let mut s = session();
        s.abort().unwrap();
        assert_eq!(s.status, SessionStatus::Aborted);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SessionStatus::Succeeded).unwrap(),
            serde_json::json!("succeeded")
        );
        assert_eq!(
            serde_json::to_value(FinalDecision::NeedsEvidence).unwrap(),
            serde_json::json!("needs_evidence")
        );
    }
}
