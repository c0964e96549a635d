// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Confidence Aggregation
//!
//! Folds five calibration signals into an overall confidence and a risk
//! score. The contradiction signal is subtracted rather than added.
//!
//! | Signal | Default weight |
//! |--------|----------------|
//! | `agent_confidence` | 0.35 |
//! | `evidence_strength` | 0.25 |
//! | `historical_accuracy` | 0.20 |
//! | `consistency_score` | 0.15 |
//! | `contradiction_penalty` | 0.05 |
//!
//! ```text
//! overall = clamp01(Σ w_i·clamp01(s_i) − w_x·clamp01(contradiction))
//! risk    = clamp01(0.7·clamp01(contradiction) + 0.3·(1 − overall))
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const AGENT_CONFIDENCE: &str = "agent_confidence";
pub const EVIDENCE_STRENGTH: &str = "evidence_strength";
pub const HISTORICAL_ACCURACY: &str = "historical_accuracy";
pub const CONSISTENCY_SCORE: &str = "consistency_score";
pub const CONTRADICTION_PENALTY: &str = "contradiction_penalty";

const RISK_CONTRADICTION_WEIGHT: f64 = 0.7;
const RISK_UNCERTAINTY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfidenceError {
    #[error("signal weight for {signal} must be non-negative, got {value}")]
    NegativeWeight { signal: String, value: f64 },

    #[error("signal weight for {0} must be finite")]
    NonFiniteWeight(String),

    #[error("unknown confidence signal: {0}")]
    UnknownSignal(String),
}

/// Clamp into `[0, 1]`. NaN maps to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub agent_confidence: f64,
    pub evidence_strength: f64,
    pub historical_accuracy: f64,
    pub consistency_score: f64,
    pub contradiction_penalty: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            agent_confidence: 0.35,
            evidence_strength: 0.25,
            historical_accuracy: 0.20,
            consistency_score: 0.15,
            contradiction_penalty: 0.05,
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.agent_confidence
            + self.evidence_strength
            + self.historical_accuracy
            + self.consistency_score
            + self.contradiction_penalty
    }

    fn slot(&mut self, signal: &str) -> Option<&mut f64> {
        match signal {
            AGENT_CONFIDENCE => Some(&mut self.agent_confidence),
            EVIDENCE_STRENGTH => Some(&mut self.evidence_strength),
            HISTORICAL_ACCURACY => Some(&mut self.historical_accuracy),
            CONSISTENCY_SCORE => Some(&mut self.consistency_score),
            CONTRADICTION_PENALTY => Some(&mut self.contradiction_penalty),
            _ => None,
        }
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            agent_confidence: self.agent_confidence * factor,
            evidence_strength: self.evidence_strength * factor,
            historical_accuracy: self.historical_accuracy * factor,
            consistency_score: self.consistency_score * factor,
            contradiction_penalty: self.contradiction_penalty * factor,
        }
    }
}

/// Merge `overrides` onto the defaults and scale so the five weights sum
/// to 1. An all-zero merge yields the defaults.
pub fn normalize_signal_weights(
    overrides: Option<&HashMap<String, f64>>,
) -> Result<SignalWeights, ConfidenceError> {
    let mut weights = SignalWeights::default();
    if let Some(overrides) = overrides {
        for (signal, value) in overrides {
            if !value.is_finite() {
                return Err(ConfidenceError::NonFiniteWeight(signal.clone()));
            }
            if *value < 0.0 {
                return Err(ConfidenceError::NegativeWeight {
                    signal: signal.clone(),
                    value: *value,
                });
            }
            let slot = weights
                .slot(signal)
                .ok_or_else(|| ConfidenceError::UnknownSignal(signal.clone()))?;
            *slot = *value;
        }
    }

    let total = weights.sum();
    if total <= 0.0 {
        return Ok(SignalWeights::default());
    }
    Ok(weights.scaled(1.0 / total))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInputs {
    pub agent_confidence: f64,
    pub evidence_strength: f64,
    pub historical_accuracy: f64,
    pub consistency_score: f64,
    pub contradiction_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfidence {
    pub overall: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceAggregator {
    weights: SignalWeights,
}

impl Default for ConfidenceAggregator {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
        }
    }
}

impl ConfidenceAggregator {
    pub fn new(overrides: Option<&HashMap<String, f64>>) -> Result<Self, ConfidenceError> {
        Ok(Self {
            weights: normalize_signal_weights(overrides)?,
        })
    }

    pub fn weights(&self) -> SignalWeights {
        self.weights
    }

    pub fn aggregate(&self, inputs: &ConfidenceInputs) -> AggregateConfidence {
        let w = &self.weights;
        let contradiction = clamp01(inputs.contradiction_penalty);
        let positive = w.agent_confidence * clamp01(inputs.agent_confidence)
            + w.evidence_strength * clamp01(inputs.evidence_strength)
            + w.historical_accuracy * clamp01(inputs.historical_accuracy)
            + w.consistency_score * clamp01(inputs.consistency_score);
        let overall = clamp01(positive - w.contradiction_penalty * contradiction);
        let risk = clamp01(
            RISK_CONTRADICTION_WEIGHT * contradiction + RISK_UNCERTAINTY_WEIGHT * (1.0 - overall),
        );
        AggregateConfidence { overall, risk }
    }
}
