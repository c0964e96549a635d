// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gated JSON completion client.
//!
//! Wraps an [`LLMProvider`] with the provider gate, a per-call timeout and
//! JSON extraction. Every failure collapses to an empty map with a `warn!`
//! so callers fall through to their fail-closed branch.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::gate::ProviderGate;
use crate::domain::llm::{
    CompletionObserver, CompletionRecord, GenerationOptions, JsonCompletionClient, LLMError,
    LLMProvider,
};

pub struct GatedJsonClient {
    provider_name: String,
    provider: Arc<dyn LLMProvider>,
    gate: Arc<ProviderGate>,
    options: GenerationOptions,
}

impl GatedJsonClient {
    pub fn new(
        provider_name: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        gate: Arc<ProviderGate>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            provider,
            gate,
            options,
        }
    }

    async fn try_complete(&self, prompt: &str, schema_hint: &Value) -> Result<Map<String, Value>, LLMError> {
        let timeout = self
            .gate
            .timeout(&self.provider_name)
            .ok_or_else(|| LLMError::UnknownProvider(self.provider_name.clone()))?;
        let full_prompt = format!(
            "{}\n\nRespond with a single JSON object matching this schema:\n{}",
            prompt, schema_hint
        );

        // the budget covers waiting for a gate slot as well as generation
        let call = async {
            let _permit = self.gate.acquire(&self.provider_name).await?;
            self.provider.generate(&full_prompt, &self.options).await
        };
        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| LLMError::Timeout(timeout))??;

        let candidate = extract_json(&response.text).unwrap_or_else(|| response.text.trim().to_string());
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(LLMError::InvalidJson(format!("expected object, got {}", kind(&other)))),
            Err(e) => Err(LLMError::InvalidJson(e.to_string())),
        }
    }
}

#[async_trait]
impl JsonCompletionClient for GatedJsonClient {
    async fn complete_json(
        &self,
        prompt: &str,
        schema_hint: &Value,
        observer: Option<&dyn CompletionObserver>,
    ) -> Map<String, Value> {
        let started = Instant::now();
        let result = self.try_complete(prompt, schema_hint).await;
        let duration = started.elapsed();

        let (map, error) = match result {
            Ok(map) => {
                debug!(provider = %self.provider_name, elapsed = ?duration, "JSON completion succeeded");
                (map, None)
            }
            Err(e) => {
                warn!(provider = %self.provider_name, error = %e, "JSON completion failed, returning empty result");
                (Map::new(), Some(e.to_string()))
            }
        };

        if let Some(observer) = observer {
            observer
                .on_completion(CompletionRecord {
                    provider: self.provider_name.clone(),
                    duration,
                    error,
                })
                .await;
        }
        map
    }
}

/// Pull the body out of a fenced code block, preferring ```json fences.
pub fn extract_json(text: &str) -> Option<String> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                let content_end = content_start + end_offset;
                return Some(text[content_start..content_end].trim().to_string());
            }
        }
    }
    None
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
