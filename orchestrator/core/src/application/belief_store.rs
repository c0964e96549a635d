// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Belief revision over the belief repository.
//!
//! Upserts are find-then-save; callers revising the same key concurrently
//! should serialize through the repository's own write path.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::domain::belief::{BeliefError, BeliefRecord, Revision};
use crate::domain::events::BeliefEvent;
use crate::domain::repository::{BeliefRepository, RepositoryError};
use crate::domain::tenant::{MemoryId, OrgId};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum BeliefStoreError {
    #[error(transparent)]
    Belief(#[from] BeliefError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct BeliefStore {
    beliefs: Arc<dyn BeliefRepository>,
    event_bus: Option<Arc<EventBus>>,
}

impl BeliefStore {
    pub fn new(beliefs: Arc<dyn BeliefRepository>) -> Self {
        Self {
            beliefs,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Create the belief, or revise the existing one. See
    /// [`BeliefRecord::revise`] for the promotion rule.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_belief(
        &self,
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: &str,
        value: Value,
        confidence: f64,
        evidence_memory_ids: Vec<MemoryId>,
        contradiction_ids: Vec<MemoryId>,
    ) -> Result<(BeliefRecord, Revision), BeliefStoreError> {
        let (record, revision) = match self.beliefs.find(org_id, memory_id, belief_key).await? {
            Some(mut existing) => {
                let revision = existing.revise(value, confidence, evidence_memory_ids, contradiction_ids)?;
                (existing, revision)
            }
            None => {
                let created = BeliefRecord::new(
                    org_id,
                    memory_id,
                    belief_key,
                    value,
                    confidence,
                    evidence_memory_ids,
                    contradiction_ids,
                )?;
                (created, Revision::Created)
            }
        };
        self.beliefs.save(&record).await?;

        info!(
            org_id = %org_id,
            memory_id = %memory_id,
            belief_key,
            revision = ?revision,
            confidence = record.confidence,
            alternatives = record.belief_value.alternatives.len(),
            "Belief revised"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish_belief_event(BeliefEvent::BeliefRevised {
                org_id,
                memory_id,
                belief_key: record.belief_key.clone(),
                revision,
                confidence: record.confidence,
                revised_at: Utc::now(),
            });
        }
        Ok((record, revision))
    }

    pub async fn get_belief(
        &self,
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: &str,
    ) -> Result<Option<BeliefRecord>, BeliefStoreError> {
        Ok(self.beliefs.find(org_id, memory_id, belief_key).await?)
    }
}
