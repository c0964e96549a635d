// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Process Queue
//!
//! `ProcessRepository` backed by the `agent_processes` table via `sqlx`.
//!
//! `claim_next` runs in one transaction:
//!
//! 1. `pg_advisory_xact_lock` keyed on the org serializes the capacity check
//!    between schedulers working the same org
//! 2. count running rows; stop at `max_running`
//! 3. select the next dispatchable row `FOR UPDATE SKIP LOCKED`, so a row
//!    held by another transaction is never handed out twice
//! 4. mark it running and commit
//!
//! Other orgs are not blocked by the advisory lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use crate::domain::process::{AgentProcess, ClaimOutcome, ProcessId, ProcessStatus};
use crate::domain::repository::{ProcessRepository, RepositoryError};
use crate::domain::tenant::OrgId;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agent_processes (
    id UUID PRIMARY KEY,
    org_id UUID NOT NULL,
    agent_name TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL,
    quota_tokens BIGINT NOT NULL DEFAULT 0,
    quota_storage_mb BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    started_at TIMESTAMPTZ,
    finished_at TIMESTAMPTZ,
    last_error TEXT
);
CREATE INDEX IF NOT EXISTS agent_processes_dispatch_idx
    ON agent_processes (org_id, status, priority DESC, created_at ASC);
"#;

const COLUMNS: &str = "id, org_id, agent_name, priority, status, attempts, max_attempts, \
     quota_tokens, quota_storage_mb, created_at, started_at, finished_at, last_error";

pub struct PostgresProcessRepository {
    pool: PgPool,
}

impl PostgresProcessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessRepository for PostgresProcessRepository {
    async fn insert(&self, process: &AgentProcess) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!(
            "INSERT INTO agent_processes ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(process.id.0)
        .bind(process.org_id.0)
        .bind(&process.agent_name)
        .bind(process.priority)
        .bind(process.status.as_str())
        .bind(to_i32(process.attempts)?)
        .bind(to_i32(process.max_attempts)?)
        .bind(to_i64(process.quota_tokens)?)
        .bind(to_i64(process.quota_storage_mb)?)
        .bind(process.created_at)
        .bind(process.started_at)
        .bind(process.finished_at)
        .bind(&process.last_error)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(RepositoryError::Conflict(
                format!("process {} exists", process.id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: ProcessId) -> Result<Option<AgentProcess>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM agent_processes WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(process_from_row).transpose()
    }

    async fn transition(
        &self,
        process: &AgentProcess,
        expected_status: ProcessStatus,
        expected_attempts: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE agent_processes
               SET status = $2,
                   attempts = $3,
                   started_at = $4,
                   finished_at = $5,
                   last_error = $6,
                   priority = $7
             WHERE id = $1
               AND status = $8
               AND attempts = $9
            "#,
        )
        .bind(process.id.0)
        .bind(process.status.as_str())
        .bind(to_i32(process.attempts)?)
        .bind(process.started_at)
        .bind(process.finished_at)
        .bind(&process.last_error)
        .bind(process.priority)
        .bind(expected_status.as_str())
        .bind(to_i32(expected_attempts)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM agent_processes WHERE id = $1")
                .bind(process.id.0)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => RepositoryError::Conflict(format!(
                    "process {} changed since it was read (expected {} at attempt {})",
                    process.id,
                    expected_status.as_str(),
                    expected_attempts
                )),
                None => RepositoryError::NotFound(format!("process {}", process.id)),
            });
        }
        Ok(())
    }

    async fn running_count(&self, org_id: OrgId) -> Result<usize, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM agent_processes WHERE org_id = $1 AND status = 'running'",
        )
        .bind(org_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn claim_next(
        &self,
        org_id: OrgId,
        max_running: usize,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(org_id.0.to_string())
            .execute(&mut *tx)
            .await?;

        let running: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM agent_processes WHERE org_id = $1 AND status = 'running'",
        )
        .bind(org_id.0)
        .fetch_one(&mut *tx)
        .await?;
        let running = usize::try_from(running).unwrap_or(0);
        if running >= max_running {
            tx.commit().await?;
            return Ok(ClaimOutcome::AtCapacity { running });
        }

        let Some(row) = next_dispatchable_row(&mut tx, org_id).await? else {
            tx.commit().await?;
            return Ok(ClaimOutcome::Empty);
        };

        let mut process = process_from_row(row)?;
        process
            .dispatch(now)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE agent_processes
               SET status = 'running',
                   attempts = $2,
                   started_at = $3,
                   last_error = NULL
             WHERE id = $1
            "#,
        )
        .bind(process.id.0)
        .bind(to_i32(process.attempts)?)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(process_id = %process.id, org_id = %org_id, attempt = process.attempts, "Claimed process");
        Ok(ClaimOutcome::Claimed(process))
    }
}

async fn next_dispatchable_row(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
) -> Result<Option<PgRow>, RepositoryError> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS}
          FROM agent_processes
         WHERE org_id = $1 AND status = 'queued' AND attempts < max_attempts
         ORDER BY priority DESC, created_at ASC
         LIMIT 1
         FOR UPDATE SKIP LOCKED
        "#
    ))
    .bind(org_id.0)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

fn process_from_row(row: PgRow) -> Result<AgentProcess, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = ProcessStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Serialization(format!("unknown process status: {}", status)))?;
    let attempts: i32 = row.try_get("attempts")?;
    let max_attempts: i32 = row.try_get("max_attempts")?;
    let quota_tokens: i64 = row.try_get("quota_tokens")?;
    let quota_storage_mb: i64 = row.try_get("quota_storage_mb")?;

    Ok(AgentProcess {
        id: ProcessId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        agent_name: row.try_get("agent_name")?,
        priority: row.try_get("priority")?,
        status,
        attempts: u32::try_from(attempts).map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        max_attempts: u32::try_from(max_attempts)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        quota_tokens: u64::try_from(quota_tokens)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        quota_storage_mb: u64::try_from(quota_storage_mb)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        last_error: row.try_get("last_error")?,
    })
}

fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn to_i64(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}
