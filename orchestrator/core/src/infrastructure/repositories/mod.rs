// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//! - **PostgresProcessRepository** - agent process queue with
//!   `FOR UPDATE SKIP LOCKED` dispatch
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests and single-process deployments:
//! - **InMemorySessionRepository** - sessions, iterations and reports
//! - **InMemoryToolCallLogRepository** - tool-call audit rows
//! - **InMemoryProcessRepository** - process queue; `claim_next` runs under
//!   one write lock so capacity check and dispatch are atomic
//! - **InMemoryTokenRepository** - issued capability tokens
//! - **InMemoryBeliefRepository** - belief records keyed by
//!   `(org, memory, key)`

pub mod postgres_process;

pub use postgres_process::PostgresProcessRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::belief::BeliefRecord;
use crate::domain::capability::{CapabilityToken, TokenId};
use crate::domain::process::{AgentProcess, ClaimOutcome, ProcessId, ProcessStatus};
use crate::domain::repository::{
    BeliefRepository, ProcessRepository, RepositoryError, SessionRepository, TokenRepository,
    ToolCallLogRepository,
};
use crate::domain::session::{CognitiveIteration, CognitiveSession, EvaluationReport, SessionId};
use crate::domain::tenant::{MemoryId, OrgId};
use crate::domain::tool::{InvocationStatus, ToolCallLog};

#[derive(Default)]
struct SessionRows {
    session: Option<CognitiveSession>,
    iterations: BTreeMap<u32, CognitiveIteration>,
    report: Option<EvaluationReport>,
}

#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, SessionRows>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &CognitiveSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        sessions.entry(session.id).or_default().session = Some(session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<CognitiveSession>, RepositoryError> {
        Ok(self.sessions.read().get(&id).and_then(|rows| rows.session.clone()))
    }

    async fn insert_iteration(&self, iteration: &CognitiveIteration) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write();
        let rows = sessions
            .get_mut(&iteration.session_id)
            .filter(|rows| rows.session.is_some())
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", iteration.session_id)))?;
        if rows.iterations.contains_key(&iteration.iteration_num) {
            return Ok(false);
        }
        rows.iterations.insert(iteration.iteration_num, iteration.clone());
        Ok(true)
    }

    async fn list_iterations(&self, session_id: SessionId) -> Result<Vec<CognitiveIteration>, RepositoryError> {
        Ok(self
            .sessions
            .read()
            .get(&session_id)
            .map(|rows| rows.iterations.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_report(&self, session_id: SessionId) -> Result<Option<EvaluationReport>, RepositoryError> {
        Ok(self.sessions.read().get(&session_id).and_then(|rows| rows.report.clone()))
    }

    async fn save_report(&self, report: &EvaluationReport) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        let rows = sessions
            .get_mut(&report.session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", report.session_id)))?;
        rows.report = Some(report.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryToolCallLogRepository {
    logs: Arc<RwLock<Vec<ToolCallLog>>>,
}

impl InMemoryToolCallLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolCallLogRepository for InMemoryToolCallLogRepository {
    async fn create(&self, log: &ToolCallLog) -> Result<(), RepositoryError> {
        self.logs.write().push(log.clone());
        Ok(())
    }

    async fn find_by_session(&self, session_id: SessionId) -> Result<Vec<ToolCallLog>, RepositoryError> {
        Ok(self
            .logs
            .read()
            .iter()
            .filter(|log| log.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn count_by_status(
        &self,
        session_id: SessionId,
        status: InvocationStatus,
    ) -> Result<usize, RepositoryError> {
        Ok(self
            .logs
            .read()
            .iter()
            .filter(|log| log.session_id == session_id && log.status == status)
            .count())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProcessRepository {
    processes: Arc<RwLock<HashMap<ProcessId, AgentProcess>>>,
}

impl InMemoryProcessRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessRepository for InMemoryProcessRepository {
    async fn insert(&self, process: &AgentProcess) -> Result<(), RepositoryError> {
        let mut processes = self.processes.write();
        if processes.contains_key(&process.id) {
            return Err(RepositoryError::Conflict(format!("process {} exists", process.id)));
        }
        processes.insert(process.id, process.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ProcessId) -> Result<Option<AgentProcess>, RepositoryError> {
        Ok(self.processes.read().get(&id).cloned())
    }

    async fn transition(
        &self,
        process: &AgentProcess,
        expected_status: ProcessStatus,
        expected_attempts: u32,
    ) -> Result<(), RepositoryError> {
        let mut processes = self.processes.write();
        let existing = processes
            .get_mut(&process.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("process {}", process.id)))?;
        if existing.status != expected_status || existing.attempts != expected_attempts {
            return Err(RepositoryError::Conflict(format!(
                "process {} is {} at attempt {}, expected {} at attempt {}",
                process.id,
                existing.status.as_str(),
                existing.attempts,
                expected_status.as_str(),
                expected_attempts
            )));
        }
        *existing = process.clone();
        Ok(())
    }

    async fn running_count(&self, org_id: OrgId) -> Result<usize, RepositoryError> {
        Ok(self
            .processes
            .read()
            .values()
            .filter(|p| p.org_id == org_id && p.status == ProcessStatus::Running)
            .count())
    }

    async fn claim_next(
        &self,
        org_id: OrgId,
        max_running: usize,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let mut processes = self.processes.write();

        let running = processes
            .values()
            .filter(|p| p.org_id == org_id && p.status == ProcessStatus::Running)
            .count();
        if running >= max_running {
            return Ok(ClaimOutcome::AtCapacity { running });
        }

        // priority DESC, created_at ASC; id breaks exact ties deterministically
        let next = processes
            .values()
            .filter(|p| p.org_id == org_id && p.is_dispatchable())
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.0.cmp(&a.id.0))
            })
            .map(|p| p.id);

        let Some(id) = next else {
            return Ok(ClaimOutcome::Empty);
        };
        let process = processes
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("process {}", id)))?;
        process
            .dispatch(now)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        Ok(ClaimOutcome::Claimed(process.clone()))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTokenRepository {
    tokens: Arc<RwLock<HashMap<TokenId, CapabilityToken>>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn save(&self, token: &CapabilityToken) -> Result<(), RepositoryError> {
        self.tokens.write().insert(token.token_id(), token.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TokenId) -> Result<Option<CapabilityToken>, RepositoryError> {
        Ok(self.tokens.read().get(&id).cloned())
    }
}

type BeliefKey = (OrgId, MemoryId, String);

#[derive(Clone, Default)]
pub struct InMemoryBeliefRepository {
    beliefs: Arc<RwLock<HashMap<BeliefKey, BeliefRecord>>>,
}

impl InMemoryBeliefRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BeliefRepository for InMemoryBeliefRepository {
    async fn find(
        &self,
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: &str,
    ) -> Result<Option<BeliefRecord>, RepositoryError> {
        Ok(self
            .beliefs
            .read()
            .get(&(org_id, memory_id, belief_key.to_string()))
            .cloned())
    }

    async fn save(&self, belief: &BeliefRecord) -> Result<(), RepositoryError> {
        self.beliefs.write().insert(
            (belief.org_id, belief.memory_id, belief.belief_key.clone()),
            belief.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::process::ProcessQuotas;

    fn queued(org: OrgId, name: &str, priority: i32) -> AgentProcess {
        AgentProcess::new(org, name, priority, 3, ProcessQuotas::default()).unwrap()
    }

    #[tokio::test]
    async fn test_transition_rejects_stale_expectation() {
        let repo = InMemoryProcessRepository::new();
        let org = OrgId::new();
        repo.insert(&queued(org, "a", 1)).await.unwrap();
        let ClaimOutcome::Claimed(running) = repo.claim_next(org, 1, Utc::now()).await.unwrap() else {
            panic!("expected a claim");
        };

        let mut done = running.clone();
        done.finish(ProcessStatus::Succeeded, None, Utc::now()).unwrap();
        // expectation taken before the claim
        let err = repo.transition(&done, ProcessStatus::Queued, 0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.find_by_id(running.id).await.unwrap().unwrap().status, ProcessStatus::Running);

        repo.transition(&done, ProcessStatus::Running, 1).await.unwrap();
        assert_eq!(repo.find_by_id(running.id).await.unwrap().unwrap().status, ProcessStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_claim_respects_priority_then_fifo() {
        let repo = InMemoryProcessRepository::new();
        let org = OrgId::new();
        let mut first_low = queued(org, "a", 1);
        let mut second_low = queued(org, "b", 1);
        first_low.created_at = Utc::now() - chrono::Duration::seconds(10);
        second_low.created_at = Utc::now();
        let high = queued(org, "c", 5);
        for p in [&second_low, &first_low, &high] {
            repo.insert(p).await.unwrap();
        }

        let order: Vec<String> = {
            let mut names = Vec::new();
            for _ in 0..3 {
                match repo.claim_next(org, 10, Utc::now()).await.unwrap() {
                    ClaimOutcome::Claimed(p) => names.push(p.agent_name),
                    other => panic!("unexpected {:?}", other),
                }
            }
            names
        };
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(repo.claim_next(org, 10, Utc::now()).await.unwrap(), ClaimOutcome::Empty);
    }

    #[tokio::test]
    async fn test_claim_at_capacity_and_org_isolation() {
        let repo = InMemoryProcessRepository::new();
        let org = OrgId::new();
        let other = OrgId::new();
        repo.insert(&queued(org, "a", 1)).await.unwrap();
        repo.insert(&queued(org, "b", 1)).await.unwrap();
        repo.insert(&queued(other, "c", 1)).await.unwrap();

        assert!(matches!(repo.claim_next(org, 1, Utc::now()).await.unwrap(), ClaimOutcome::Claimed(_)));
        assert_eq!(
            repo.claim_next(org, 1, Utc::now()).await.unwrap(),
            ClaimOutcome::AtCapacity { running: 1 }
        );
        // another org's cap is independent
        assert!(matches!(repo.claim_next(other, 1, Utc::now()).await.unwrap(), ClaimOutcome::Claimed(_)));
        assert_eq!(repo.running_count(org).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_iteration_insert_is_idempotent() {
        use crate::domain::agents::CriticEvaluation;
        use crate::domain::session::IterationMetrics;
        use crate::domain::tenant::UserId;
        use serde_json::json;

        let repo = InMemorySessionRepository::new();
        let session = CognitiveSession::new(OrgId::new(), UserId::new(), "triage", None).unwrap();
        repo.save(&session).await.unwrap();

        let iteration = CognitiveIteration {
            session_id: session.id,
            iteration_num: 1,
            plan_json: json!({}),
            execution_json: json!({}),
            critique_json: json!({}),
            evaluation: CriticEvaluation::Retry,
            metrics: IterationMetrics::default(),
            evidence_memory_ids: vec![],
            created_at: Utc::now(),
        };
        assert!(repo.insert_iteration(&iteration).await.unwrap());
        assert!(!repo.insert_iteration(&iteration).await.unwrap());
        assert_eq!(repo.list_iterations(session.id).await.unwrap().len(), 1);
    }
}
