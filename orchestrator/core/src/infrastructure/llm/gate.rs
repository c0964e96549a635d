// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-provider concurrency gate.
//!
//! Built once at startup from `spec.llm.gates` and shared by every client
//! talking to the same provider. Each provider gets a fixed-size semaphore
//! and a per-call timeout; unknown providers are rejected rather than
//! admitted unbounded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::domain::config::LlmConfig;
use crate::domain::llm::LLMError;

struct Gate {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
}

pub struct ProviderGate {
    gates: HashMap<String, Gate>,
}

/// Held for the duration of one completion.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    pub timeout: Duration,
}

impl ProviderGate {
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut gates = HashMap::new();
        for gate in &config.gates {
            info!(
                provider = %gate.name,
                max_concurrency = gate.max_concurrency,
                timeout = ?gate.timeout,
                "Configured LLM provider gate"
            );
            gates.insert(
                gate.name.clone(),
                Gate {
                    semaphore: Arc::new(Semaphore::new(gate.max_concurrency)),
                    max_concurrency: gate.max_concurrency,
                    timeout: gate.timeout,
                },
            );
        }
        Self { gates }
    }

    /// Wait for a slot on `provider`.
    pub async fn acquire(&self, provider: &str) -> Result<GatePermit, LLMError> {
        let gate = self
            .gates
            .get(provider)
            .ok_or_else(|| LLMError::UnknownProvider(provider.to_string()))?;
        let permit = gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| LLMError::Provider(e.to_string()))?;
        Ok(GatePermit {
            _permit: permit,
            timeout: gate.timeout,
        })
    }

    pub fn available(&self, provider: &str) -> Option<usize> {
        self.gates.get(provider).map(|g| g.semaphore.available_permits())
    }

    pub fn timeout(&self, provider: &str) -> Option<Duration> {
        self.gates.get(provider).map(|g| g.timeout)
    }

    pub fn capacity(&self, provider: &str) -> Option<usize> {
        self.gates.get(provider).map(|g| g.max_concurrency)
    }

    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gates.keys().cloned().collect();
        names.sort();
        names
    }
}
