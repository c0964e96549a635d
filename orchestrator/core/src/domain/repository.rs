// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the DDD Repository
//! pattern: interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `SessionRepository` | `CognitiveSession` (+ iterations, report) | `InMemorySessionRepository` |
//! | `ToolCallLogRepository` | `ToolCallLog` | `InMemoryToolCallLogRepository` |
//! | `ProcessRepository` | `AgentProcess` | `InMemoryProcessRepository`, `PostgresProcessRepository` |
//! | `TokenRepository` | `CapabilityToken` | `InMemoryTokenRepository` |
//! | `BeliefRepository` | `BeliefRecord` | `InMemoryBeliefRepository` |
//!
//! Tenant isolation is the storage layer's responsibility; every lookup is
//! nonetheless keyed by tenant-scoped identifiers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::belief::BeliefRecord;
use crate::domain::capability::{CapabilityToken, TokenId};
use crate::domain::process::{AgentProcess, ClaimOutcome, ProcessId, ProcessStatus};
use crate::domain::session::{CognitiveIteration, CognitiveSession, EvaluationReport, SessionId};
use crate::domain::tenant::{MemoryId, OrgId};
use crate::domain::tool::{InvocationStatus, ToolCallLog};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Sessions with their iteration rows and terminal report.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Save session (create or update)
    async fn save(&self, session: &CognitiveSession) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: SessionId) -> Result<Option<CognitiveSession>, RepositoryError>;

    /// Insert an iteration row. Returns `false` without writing when a row
    /// with the same `iteration_num` already exists.
    async fn insert_iteration(&self, iteration: &CognitiveIteration) -> Result<bool, RepositoryError>;

    /// Iterations ordered by `iteration_num` ascending
    async fn list_iterations(&self, session_id: SessionId) -> Result<Vec<CognitiveIteration>, RepositoryError>;

    async fn find_report(&self, session_id: SessionId) -> Result<Option<EvaluationReport>, RepositoryError>;

    /// Store the report, replacing any previous one for the session
    async fn save_report(&self, report: &EvaluationReport) -> Result<(), RepositoryError>;
}

/// Audit trail of every tool invocation attempt, including denials.
#[async_trait]
pub trait ToolCallLogRepository: Send + Sync {
    async fn create(&self, log: &ToolCallLog) -> Result<(), RepositoryError>;

    async fn find_by_session(&self, session_id: SessionId) -> Result<Vec<ToolCallLog>, RepositoryError>;

    async fn count_by_status(
        &self,
        session_id: SessionId,
        status: InvocationStatus,
    ) -> Result<usize, RepositoryError>;
}

/// Agent process queue.
///
/// `claim_next` must be atomic with respect to concurrent callers: the
/// capacity check and the queued → running transition happen as one unit,
/// and a row claimed by one caller is never handed to another.
#[async_trait]
pub trait ProcessRepository: Send + Sync {
    async fn insert(&self, process: &AgentProcess) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ProcessId) -> Result<Option<AgentProcess>, RepositoryError>;

    /// Write `process` only if the stored row still has `expected_status`
    /// and `expected_attempts`. A mismatch is `RepositoryError::Conflict`
    /// and leaves the row untouched.
    async fn transition(
        &self,
        process: &AgentProcess,
        expected_status: ProcessStatus,
        expected_attempts: u32,
    ) -> Result<(), RepositoryError>;

    async fn running_count(&self, org_id: OrgId) -> Result<usize, RepositoryError>;

    /// Dispatch the highest-priority, oldest dispatchable process of the org
    /// unless `max_running` processes are already running.
    async fn claim_next(
        &self,
        org_id: OrgId,
        max_running: usize,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn save(&self, token: &CapabilityToken) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: TokenId) -> Result<Option<CapabilityToken>, RepositoryError>;
}

#[async_trait]
pub trait BeliefRepository: Send + Sync {
    async fn find(
        &self,
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: &str,
    ) -> Result<Option<BeliefRecord>, RepositoryError>;

    /// Create or replace the record for its `(org, memory, key)`
    async fn save(&self, belief: &BeliefRecord) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
