// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Belief Records
//!
//! A belief is a confidence-scored claim about a memory, keyed by
//! `(org_id, memory_id, belief_key)`. Beliefs are revised, never overwritten:
//! a displaced `current` value is demoted into `alternatives`, and
//! `alternatives` only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::tenant::{MemoryId, OrgId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefValue {
    pub current: Value,
    #[serde(default)]
    pub alternatives: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefRecord {
    pub org_id: OrgId,
    pub memory_id: MemoryId,
    pub belief_key: String,
    pub belief_value: BeliefValue,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub evidence_memory_ids: Vec<MemoryId>,
    pub contradiction_ids: Vec<MemoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of folding a new observation into a belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    Created,
    /// The new value displaced `current`.
    Promoted,
    /// The new value was recorded as an alternative.
    Appended,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BeliefError {
    #[error("belief key must not be empty")]
    EmptyKey,

    #[error("confidence must be a finite number")]
    NonFiniteConfidence,
}

pub fn clamp_confidence(confidence: f64) -> Result<f64, BeliefError> {
    if !confidence.is_finite() {
        return Err(BeliefError::NonFiniteConfidence);
    }
    Ok(confidence.clamp(0.0, 1.0))
}

impl BeliefRecord {
    pub fn new(
        org_id: OrgId,
        memory_id: MemoryId,
        belief_key: impl Into<String>,
        value: Value,
        confidence: f64,
        evidence_memory_ids: Vec<MemoryId>,
        contradiction_ids: Vec<MemoryId>,
    ) -> Result<Self, BeliefError> {
        let belief_key = belief_key.into();
        if belief_key.trim().is_empty() {
            return Err(BeliefError::EmptyKey);
        }
        let now = Utc::now();
        Ok(Self {
            org_id,
            memory_id,
            belief_key,
            belief_value: BeliefValue {
                current: value,
                alternatives: Vec::new(),
            },
            confidence: clamp_confidence(confidence)?,
            evidence_memory_ids,
            contradiction_ids,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fold a new observation in.
    ///
    /// A strictly higher confidence promotes `value` and demotes the old
    /// `current`; otherwise `value` is appended to `alternatives` and the
    /// stored confidence is kept. Evidence and contradiction ids are replaced
    /// either way.
    pub fn revise(
        &mut self,
        value: Value,
        confidence: f64,
        evidence_memory_ids: Vec<MemoryId>,
        contradiction_ids: Vec<MemoryId>,
    ) -> Result<Revision, BeliefError> {
        let confidence = clamp_confidence(confidence)?;
        let revision = if confidence > self.confidence {
            let previous = std::mem::replace(&mut self.belief_value.current, value);
            self.belief_value.alternatives.push(previous);
            self.confidence = confidence;
            Revision::Promoted
        } else {
            self.belief_value.alternatives.push(value);
            Revision::Appended
        };
        self.evidence_memory_ids = evidence_memory_ids;
        self.contradiction_ids = contradiction_ids;
        self.updated_at = Utc::now();
        Ok(revision)
    }
}
