// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Registry
//!
//! Catalog of invocable tools. Each entry pairs a [`ToolSpec`] with a
//! [`ToolHandler`]. JSON Schemas on the `ToolSpec` are compiled once at
//! registration so a malformed schema is rejected up front rather than on
//! first call.
//!
//! `invoke` performs no authorization; callers go through
//! [`crate::application::tool_invoker::ToolInvoker`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::tool::{ToolError, ToolSpec};

/// Executes one tool. Must return a JSON object.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: Map<String, Value>) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync,
{
    async fn call(&self, input: Map<String, Value>) -> anyhow::Result<Value> {
        (self.0)(input).await
    }
}

pub fn handler_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Map<String, Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
    input_validator: Option<jsonschema::Validator>,
    output_validator: Option<jsonschema::Validator>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<RegisteredTool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique; an existing entry is never replaced.
    pub fn register(&self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Result<(), ToolError> {
        let input_validator = compile(&spec.name, "input", spec.input_schema.as_ref())?;
        let output_validator = compile(&spec.name, "output", spec.output_schema.as_ref())?;

        let mut tools = self.tools.write();
        if tools.contains_key(&spec.name) {
            return Err(ToolError::AlreadyRegistered(spec.name));
        }
        debug!(tool = %spec.name, version = %spec.version, "Registered tool");
        tools.insert(
            spec.name.clone(),
            Arc::new(RegisteredTool {
                spec,
                handler,
                input_validator,
                output_validator,
            }),
        );
        Ok(())
    }

    pub fn get_spec(&self, name: &str) -> Option<ToolSpec> {
        self.tools.read().get(name).map(|t| t.spec.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.read().values().map(|t| t.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Validate input, run the handler, validate output.
    pub async fn invoke(
        &self,
        name: &str,
        input: Map<String, Value>,
    ) -> Result<Map<String, Value>, ToolError> {
        // clone the Arc so the lock is not held across the handler await
        let tool = self
            .tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let input = Value::Object(input);
        if let Some(validator) = &tool.input_validator {
            let errors = collect_errors(validator, &input);
            if !errors.is_empty() {
                return Err(ToolError::InvalidInput {
                    tool: name.to_string(),
                    errors,
                });
            }
        }
        let Value::Object(input) = input else {
            return Err(ToolError::InvalidInput {
                tool: name.to_string(),
                errors: vec!["input must be an object".to_string()],
            });
        };

        let output = tool
            .handler
            .call(input)
            .await
            .map_err(|e| ToolError::HandlerFailed {
                tool: name.to_string(),
                message: e.to_string(),
            })?;

        if let Some(validator) = &tool.output_validator {
            let errors = collect_errors(validator, &output);
            if !errors.is_empty() {
                return Err(ToolError::InvalidOutput {
                    tool: name.to_string(),
                    errors,
                });
            }
        }

        match output {
            Value::Object(map) => Ok(map),
            _ => Err(ToolError::NonObjectOutput(name.to_string())),
        }
    }
}

fn compile(
    tool: &str,
    kind: &'static str,
    schema: Option<&Value>,
) -> Result<Option<jsonschema::Validator>, ToolError> {
    schema
        .map(|schema| {
            jsonschema::validator_for(schema).map_err(|e| ToolError::InvalidSchema {
                tool: tool.to_string(),
                kind,
                message: e.to_string(),
            })
        })
        .transpose()
}

fn collect_errors(validator: &jsonschema::Validator, instance: &Value) -> Vec<String> {
    validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect()
}
