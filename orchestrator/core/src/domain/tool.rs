// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Catalog Types
//!
//! [`ToolSpec`] describes an invocable tool together with the policy metadata
//! the guard evaluates before any call (permissions, scopes, clearance,
//! justification) and the sensitivity rules the invoker applies when writing
//! the tool-call log.
//!
//! Every invocation attempt, including denials, produces exactly one
//! [`ToolCallLog`] row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::domain::capability::ScopeSet;
use crate::domain::session::SessionId;
use crate::domain::tenant::OrgId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(pub Uuid);

impl ToolCallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistence rules for tool-call logs.
///
/// Redacted field entries are top-level keys or dotted paths
/// (`credentials.password`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSensitivity {
    #[serde(default)]
    pub allow_persist_input: bool,
    #[serde(default)]
    pub allow_persist_output: bool,
    #[serde(default)]
    pub redacted_input_fields: Vec<String>,
    #[serde(default)]
    pub redacted_output_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique within a registry.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// RBAC permissions, all of which must be granted.
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// When set, the caller's active scope must be a member.
    #[serde(default)]
    pub allowed_scopes: Option<ScopeSet>,
    #[serde(default)]
    pub require_justification: bool,
    #[serde(default)]
    pub min_clearance_level: u8,
    #[serde(default)]
    pub sensitivity: ToolSensitivity,
    /// JSON Schema for the input map.
    #[serde(default)]
    pub input_schema: Option<Value>,
    /// JSON Schema for the output map.
    #[serde(default)]
    pub output_schema: Option<Value>,
}

impl ToolSpec {
    /// Spec with no restrictions beyond what the builder methods add.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            required_permissions: Vec::new(),
            allowed_scopes: None,
            require_justification: false,
            min_clearance_level: 0,
            sensitivity: ToolSensitivity::default(),
            input_schema: None,
            output_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    pub fn with_allowed_scopes(mut self, scopes: ScopeSet) -> Self {
        self.allowed_scopes = Some(scopes);
        self
    }

    pub fn with_justification_required(mut self) -> Self {
        self.require_justification = true;
        self
    }

    pub fn with_min_clearance(mut self, level: u8) -> Self {
        self.min_clearance_level = level;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: ToolSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Denied,
    Failed,
    Skipped,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Success => "success",
            InvocationStatus::Denied => "denied",
            InvocationStatus::Failed => "failed",
            InvocationStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub status: InvocationStatus,
    pub tool_call_id: ToolCallId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ToolInvocationResult {
    pub fn success(
        tool_call_id: ToolCallId,
        output: serde_json::Map<String, Value>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            status: InvocationStatus::Success,
            tool_call_id,
            output: Some(output),
            error: None,
            denial_reason: None,
            warnings,
        }
    }

    pub fn denied(tool_call_id: ToolCallId, reason: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            status: InvocationStatus::Denied,
            tool_call_id,
            output: None,
            error: None,
            denial_reason: Some(reason.into()),
            warnings,
        }
    }

    pub fn failed(tool_call_id: ToolCallId, error: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            status: InvocationStatus::Failed,
            tool_call_id,
            output: None,
            error: Some(error.into()),
            denial_reason: None,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Only shapes and sizes are recorded.
    Summary,
    /// Payload recorded with configured fields redacted.
    Persisted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallLog {
    pub id: ToolCallId,
    pub org_id: OrgId,
    pub session_id: SessionId,
    pub iteration_num: u32,
    pub tool_name: String,
    pub status: InvocationStatus,
    pub mode: LogMode,
    pub summary: Value,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Registry-level failures: malformed input/output or a broken handler.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("tool not registered: {0}")]
    NotFound(String),

    #[error("invalid {kind} schema for tool {tool}: {message}")]
    InvalidSchema {
        tool: String,
        kind: &'static str,
        message: String,
    },

    #[error("invalid input for tool {tool}: {errors:?}")]
    InvalidInput { tool: String, errors: Vec<String> },

    #[error("invalid output from tool {tool}: {errors:?}")]
    InvalidOutput { tool: String, errors: Vec<String> },

    #[error("tool {0} returned a non-object output")]
    NonObjectOutput(String),

    #[error("tool {tool} handler failed: {message}")]
    HandlerFailed { tool: String, message: String },
}
