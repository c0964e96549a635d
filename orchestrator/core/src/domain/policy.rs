// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Authorization Policy Types
//!
//! Inputs and outputs of [`crate::application::policy_guard::PolicyGuard`].
//! A [`ToolContext`] describes who is calling and under which credentials;
//! a [`PolicyDecision`] is the guard's verdict, always returned as data so
//! the call site can log and surface it without unwinding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::capability::{CapabilityToken, Scope};
use crate::domain::self_model::SelfModel;
use crate::domain::session::SessionId;
use crate::domain::tenant::{OrgId, UserId};

/// Caller identity and credentials for one tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub session_id: Option<SessionId>,
    pub agent_id: Option<String>,
    /// Capability token presented with the call, if any.
    pub token: Option<CapabilityToken>,
    /// Scope the caller is acting under.
    pub scope: Option<Scope>,
    pub clearance_level: u8,
    /// Raw classification label of the data being touched.
    pub classification: Option<String>,
    pub justification: Option<String>,
    pub self_model: Option<Arc<SelfModel>>,
}

impl ToolContext {
    pub fn new(org_id: OrgId, user_id: UserId) -> Self {
        Self {
            org_id,
            user_id,
            session_id: None,
            agent_id: None,
            token: None,
            scope: None,
            clearance_level: 0,
            classification: None,
            justification: None,
            self_model: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_token(mut self, token: CapabilityToken, scope: Scope) -> Self {
        self.token = Some(token);
        self.scope = Some(scope);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_clearance(mut self, level: u8) -> Self {
        self.clearance_level = level;
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_self_model(mut self, self_model: Arc<SelfModel>) -> Self {
        self.self_model = Some(self_model);
        self
    }

    /// Justification counts only when it has non-whitespace content.
    pub fn has_justification(&self) -> bool {
        self.justification
            .as_deref()
            .map(|j| !j.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionDetails {
    /// Justification was demanded because of the tool's reliability record.
    #[serde(default)]
    pub reliability_adjusted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_clearance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_permission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
    /// Which check produced the verdict (`justification`, `clearance`, `scope`,
    /// `classification`, `capability`, `registry`, or the RBAC method).
    pub method: String,
    #[serde(default)]
    pub details: DecisionDetails,
}

impl PolicyDecision {
    pub fn allow(reason: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            method: method.into(),
            details: DecisionDetails::default(),
        }
    }

    pub fn deny(reason: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            method: method.into(),
            details: DecisionDetails::default(),
        }
    }

    pub fn with_details(mut self, details: DecisionDetails) -> Self {
        self.details = details;
        self
    }

    pub fn warnings(&self) -> Vec<String> {
        self.details.reliability_warning.iter().cloned().collect()
    }
}

/// Answer returned by the RBAC collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacDecision {
    pub allowed: bool,
    pub reason: String,
    pub method: String,
}

/// Opaque role-based access oracle.
///
/// An `Err` is treated as a denial by the guard.
#[async_trait]
pub trait RbacChecker: Send + Sync {
    async fn check_permission(
        &self,
        user_id: UserId,
        org_id: OrgId,
        permission: &str,
    ) -> anyhow::Result<RbacDecision>;
}
