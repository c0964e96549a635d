// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype injected into
//! the PostgreSQL repositories. Only needed when
//! [`StorageBackend::PostgreSQL`] is selected.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{PostgresConfig, ProcessRepository, StorageBackend};
use crate::infrastructure::repositories::{InMemoryProcessRepository, PostgresProcessRepository};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Build the process queue for the configured backend. The PostgreSQL
/// schema is created if missing.
pub async fn process_repository(backend: &StorageBackend) -> Result<Arc<dyn ProcessRepository>> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryProcessRepository::new())),
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(config).await?;
            let repo = PostgresProcessRepository::new(db.get_pool().clone());
            repo.migrate().await?;
            info!("Using PostgreSQL process queue");
            Ok(Arc::new(repo))
        }
    }
}
