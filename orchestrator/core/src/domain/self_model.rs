// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Self-model snapshot consumed read-only by the guard, planner and loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::tenant::OrgId;

pub const MIN_EVIDENCE_MULTIPLIER: f64 = 1.0;
pub const MAX_EVIDENCE_MULTIPLIER: f64 = 3.0;
pub const MIN_EVIDENCE_LIMIT: usize = 1;
pub const MAX_EVIDENCE_LIMIT: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolReliability {
    /// Fraction of successful calls over the trailing 30 days.
    pub success_rate_30d: f64,
    pub sample_size_30d: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfModel {
    #[serde(default)]
    pub unreliable_tools: Vec<String>,
    #[serde(default)]
    pub low_confidence_domains: Vec<String>,
    #[serde(default = "default_multiplier")]
    pub recommended_evidence_multiplier: f64,
    #[serde(default)]
    pub tool_reliability: HashMap<String, ToolReliability>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for SelfModel {
    fn default() -> Self {
        Self {
            unreliable_tools: Vec::new(),
            low_confidence_domains: Vec::new(),
            recommended_evidence_multiplier: default_multiplier(),
            tool_reliability: HashMap::new(),
        }
    }
}

impl SelfModel {
    /// Multiplier clamped to `[1, 3]`. Non-finite values fall back to 1.
    pub fn evidence_multiplier(&self) -> f64 {
        let m = self.recommended_evidence_multiplier;
        if !m.is_finite() {
            return MIN_EVIDENCE_MULTIPLIER;
        }
        m.clamp(MIN_EVIDENCE_MULTIPLIER, MAX_EVIDENCE_MULTIPLIER)
    }

    pub fn reliability(&self, tool_name: &str) -> Option<&ToolReliability> {
        self.tool_reliability.get(tool_name)
    }
}

/// `clamp(base * clamp(multiplier, 1, 3), 1, 30)`.
pub fn evidence_limit(base_limit: usize, self_model: Option<&SelfModel>) -> usize {
    let multiplier = self_model
        .map(SelfModel::evidence_multiplier)
        .unwrap_or(MIN_EVIDENCE_MULTIPLIER);
    let scaled = (base_limit as f64 * multiplier).round() as usize;
    scaled.clamp(MIN_EVIDENCE_LIMIT, MAX_EVIDENCE_LIMIT)
}

#[async_trait]
pub trait SelfModelProvider: Send + Sync {
    /// Latest snapshot for the org, `None` when no model has been computed.
    async fn snapshot(&self, org_id: OrgId) -> anyhow::Result<Option<SelfModel>>;
}
