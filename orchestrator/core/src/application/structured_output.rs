// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Schema-checked decoding of LLM replies.
//!
//! The JSON Schema is generated from the output type with `schemars`, sent to
//! the model as a hint, and compiled with `jsonschema` to check the reply.
//! A reply is accepted only if it passes the schema *and* deserializes.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tracing::warn;

pub struct StructuredOutput<T> {
    schema: Value,
    validator: Option<jsonschema::Validator>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput<T> {
    pub fn new() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
        let validator = match jsonschema::validator_for(&schema) {
            Ok(v) => Some(v),
            Err(e) => {
                // every reply will be rejected, which routes callers to their fallback
                warn!(error = %e, "Generated output schema failed to compile");
                None
            }
        };
        Self {
            schema,
            validator,
            _marker: PhantomData,
        }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validation errors, empty when the reply is acceptable.
    pub fn check(&self, reply: &Map<String, Value>) -> Vec<String> {
        let Some(validator) = &self.validator else {
            return vec!["output schema unavailable".to_string()];
        };
        let instance = Value::Object(reply.clone());
        validator.iter_errors(&instance).map(|e| e.to_string()).collect()
    }

    pub fn decode(&self, reply: Map<String, Value>) -> Result<T, Vec<String>> {
        if reply.is_empty() {
            return Err(vec!["empty reply".to_string()]);
        }
        let errors = self.check(&reply);
        if !errors.is_empty() {
            return Err(errors);
        }
        serde_json::from_value(Value::Object(reply)).map_err(|e| vec![e.to_string()])
    }
}

impl<T: JsonSchema + DeserializeOwned> Default for StructuredOutput<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agents::{CriticEvaluation, CriticOutput};
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_accepts_conforming_reply() {
        let out = StructuredOutput::<CriticOutput>::new();
        let critique = out
            .decode(obj(json!({"evaluation": "pass", "confidence": 0.9})))
            .unwrap();
        assert_eq!(critique.evaluation, CriticEvaluation::Pass);
    }

    #[test]
    fn test_rejects_out_of_range_and_unknown_values() {
        let out = StructuredOutput::<CriticOutput>::new();
        assert!(out.decode(obj(json!({"evaluation": "pass", "confidence": 1.5}))).is_err());
        assert!(out.decode(obj(json!({"evaluation": "great", "confidence": 0.5}))).is_err());
        assert!(out.decode(obj(json!({"confidence": 0.5}))).is_err());
        assert!(out.decode(Map::new()).is_err());
    }
}
