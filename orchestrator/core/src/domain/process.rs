// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Process Aggregate
//!
//! An [`AgentProcess`] is one unit of queued agent work. It is created at
//! enqueue time and mutated only by scheduler transitions.
//!
//! ## Transitions
//! | From | To | Operation |
//! |------|----|-----------|
//! | `Queued` | `Running` | `dispatch` (`attempts += 1`) |
//! | `Queued` / `Running` | `Succeeded` / `Failed` / `Blocked` | `finish` |
//! | `Running` | `Queued` | `requeue` (attempts kept) |
//!
//! `Succeeded`, `Failed` and `Blocked` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::tenant::OrgId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Queued,
    Running,
    Blocked,
    Succeeded,
    Failed,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Succeeded | ProcessStatus::Failed | ProcessStatus::Blocked
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Queued => "queued",
            ProcessStatus::Running => "running",
            ProcessStatus::Blocked => "blocked",
            ProcessStatus::Succeeded => "succeeded",
            ProcessStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ProcessStatus::Queued),
            "running" => Some(ProcessStatus::Running),
            "blocked" => Some(ProcessStatus::Blocked),
            "succeeded" => Some(ProcessStatus::Succeeded),
            "failed" => Some(ProcessStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessQuotas {
    pub quota_tokens: u64,
    pub quota_storage_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("{0} is not a terminal process status")]
    NotTerminalTarget(ProcessStatus),

    #[error("process {process_id} is already {status}")]
    AlreadyTerminal {
        process_id: ProcessId,
        status: ProcessStatus,
    },

    #[error("process {process_id} cannot move from {from} to {to}")]
    InvalidTransition {
        process_id: ProcessId,
        from: ProcessStatus,
        to: ProcessStatus,
    },

    #[error("process {process_id} exhausted its attempt budget ({attempts}/{max_attempts})")]
    AttemptsExhausted {
        process_id: ProcessId,
        attempts: u32,
        max_attempts: u32,
    },

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("agent name must not be empty")]
    EmptyAgentName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProcess {
    pub id: ProcessId,
    pub org_id: OrgId,
    pub agent_name: String,
    /// Higher runs first.
    pub priority: i32,
    pub status: ProcessStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub quota_tokens: u64,
    pub quota_storage_mb: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AgentProcess {
    pub fn new(
        org_id: OrgId,
        agent_name: impl Into<String>,
        priority: i32,
        max_attempts: u32,
        quotas: ProcessQuotas,
    ) -> Result<Self, ProcessError> {
        let agent_name = agent_name.into();
        if agent_name.trim().is_empty() {
            return Err(ProcessError::EmptyAgentName);
        }
        if max_attempts == 0 {
            return Err(ProcessError::InvalidMaxAttempts);
        }
        Ok(Self {
            id: ProcessId::new(),
            org_id,
            agent_name,
            priority,
            status: ProcessStatus::Queued,
            attempts: 0,
            max_attempts,
            quota_tokens: quotas.quota_tokens,
            quota_storage_mb: quotas.quota_storage_mb,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
        })
    }

    /// Queued with attempt budget remaining.
    pub fn is_dispatchable(&self) -> bool {
        self.status == ProcessStatus::Queued && self.attempts < self.max_attempts
    }

    pub fn dispatch(&mut self, now: DateTime<Utc>) -> Result<(), ProcessError> {
        if self.status != ProcessStatus::Queued {
            return Err(ProcessError::InvalidTransition {
                process_id: self.id,
                from: self.status,
                to: ProcessStatus::Running,
            });
        }
        if self.attempts >= self.max_attempts {
            return Err(self.exhausted());
        }
        self.status = ProcessStatus::Running;
        self.attempts += 1;
        self.started_at = Some(now);
        self.last_error = None;
        Ok(())
    }

    /// Terminal transition. `reason` is stored as `last_error`.
    pub fn finish(
        &mut self,
        target: ProcessStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ProcessError> {
        if !target.is_terminal() {
            return Err(ProcessError::NotTerminalTarget(target));
        }
        if self.status.is_terminal() {
            return Err(ProcessError::AlreadyTerminal {
                process_id: self.id,
                status: self.status,
            });
        }
        self.status = target;
        self.finished_at = Some(now);
        self.last_error = reason;
        Ok(())
    }

    /// Return a running process to the queue. Attempts are not reset, and a
    /// process whose budget is spent cannot be requeued.
    pub fn requeue(&mut self, reason: Option<String>) -> Result<(), ProcessError> {
        if self.status != ProcessStatus::Running {
            return Err(ProcessError::InvalidTransition {
                process_id: self.id,
                from: self.status,
                to: ProcessStatus::Queued,
            });
        }
        if self.attempts >= self.max_attempts {
            return Err(self.exhausted());
        }
        self.status = ProcessStatus::Queued;
        self.started_at = None;
        self.finished_at = None;
        self.last_error = reason;
        Ok(())
    }

    fn exhausted(&self) -> ProcessError {
        ProcessError::AttemptsExhausted {
            process_id: self.id,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
        }
    }
}

/// Result of an atomic claim attempt against the process queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(AgentProcess),
    /// The org already runs `max_running_per_org` processes.
    AtCapacity { running: usize },
    /// No dispatchable process is queued for the org.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(max_attempts: u32) -> AgentProcess {
        AgentProcess::new(OrgId::new(), "summariser", 1, max_attempts, ProcessQuotas::default()).unwrap()
    }

    #[test]
    fn test_dispatch_increments_attempts_and_clears_error() {
        let mut p = process(3);
        p.last_error = Some("previous".into());
        p.dispatch(Utc::now()).unwrap();
        assert_eq!(p.status, ProcessStatus::Running);
        assert_eq!(p.attempts, 1);
        assert!(p.started_at.is_some());
        assert!(p.last_error.is_none());
    }

    #[test]
    fn test_finish_rejects_non_terminal_target() {
        let mut p = process(1);
        assert_eq!(
            p.finish(ProcessStatus::Running, None, Utc::now()),
            Err(ProcessError::NotTerminalTarget(ProcessStatus::Running))
        );
        assert_eq!(
            p.finish(ProcessStatus::Queued, None, Utc::now()),
            Err(ProcessError::NotTerminalTarget(ProcessStatus::Queued))
        );
    }

    #[test]
    fn test_finish_twice_is_rejected() {
        let mut p = process(1);
        p.dispatch(Utc::now()).unwrap();
        p.finish(ProcessStatus::Blocked, Some("quota".into()), Utc::now()).unwrap();
        assert_eq!(p.last_error.as_deref(), Some("quota"));
        assert!(matches!(
            p.finish(ProcessStatus::Succeeded, None, Utc::now()),
            Err(ProcessError::AlreadyTerminal { .. })
        ));
    }

    #[test]
    fn test_requeue_keeps_attempts() {
        let mut p = process(3);
        p.dispatch(Utc::now()).unwrap();
        p.requeue(Some("preempted".into())).unwrap();
        assert_eq!(p.status, ProcessStatus::Queued);
        assert_eq!(p.attempts, 1);
        assert!(p.started_at.is_none());
        assert!(p.finished_at.is_none());
    }

    #[test]
    fn test_requeue_rejected_when_budget_spent() {
        let mut p = process(1);
        p.dispatch(Utc::now()).unwrap();
        assert!(matches!(
            p.requeue(None),
            Err(ProcessError::AttemptsExhausted { attempts: 1, max_attempts: 1, .. })
        ));
        assert!(!p.is_dispatchable());
    }

    #[test]
    fn test_invalid_construction() {
        assert_eq!(
            AgentProcess::new(OrgId::new(), "a", 0, 0, ProcessQuotas::default()).unwrap_err(),
            ProcessError::InvalidMaxAttempts
        );
        assert_eq!(
            AgentProcess::new(OrgId::new(), " ", 0, 1, ProcessQuotas::default()).unwrap_err(),
            ProcessError::EmptyAgentName
        );
    }
}
