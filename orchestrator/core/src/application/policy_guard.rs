// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Guard
//!
//! Authorizes a tool call for a [`ToolContext`]. Checks run in a fixed
//! order and the first failure short-circuits:
//!
//! 1. Justification: demanded by the spec, or by a poor reliability record
//!    (`success_rate_30d` below threshold with enough samples)
//! 2. Clearance level
//! 3. Scope restriction
//! 4. Classification label validity
//! 5. RBAC, one permission at a time
//!
//! A reliability-triggered justification that *was* supplied does not deny;
//! it is surfaced as `details.reliability_warning` on the allow decision.
//!
//! Decisions are returned as data, never as errors. RBAC transport failures
//! deny.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::classification::Classification;
use crate::domain::config::PolicyConfig;
use crate::domain::policy::{DecisionDetails, PolicyDecision, RbacChecker, ToolContext};
use crate::domain::tool::ToolSpec;

pub const METHOD_JUSTIFICATION: &str = "justification";
pub const METHOD_CLEARANCE: &str = "clearance";
pub const METHOD_SCOPE: &str = "scope";
pub const METHOD_CLASSIFICATION: &str = "classification";
pub const METHOD_RBAC_ERROR: &str = "rbac_error";
pub const METHOD_POLICY: &str = "policy";

pub struct PolicyGuard {
    rbac: Arc<dyn RbacChecker>,
    config: PolicyConfig,
}

impl PolicyGuard {
    pub fn new(rbac: Arc<dyn RbacChecker>, config: PolicyConfig) -> Self {
        Self { rbac, config }
    }

    pub async fn authorize(&self, tool: &ToolSpec, ctx: &ToolContext) -> PolicyDecision {
        let decision = self.evaluate(tool, ctx).await;
        let outcome = if decision.allowed { "allowed" } else { "denied" };
        metrics::counter!(
            "aegis_policy_decisions_total",
            "outcome" => outcome,
            "method" => decision.method.clone()
        )
        .increment(1);

        if decision.allowed {
            debug!(tool = %tool.name, method = %decision.method, "Tool call authorized");
        } else {
            info!(
                tool = %tool.name,
                org_id = %ctx.org_id,
                user_id = %ctx.user_id,
                method = %decision.method,
                reason = %decision.reason,
                "Tool call denied"
            );
        }
        decision
    }

    async fn evaluate(&self, tool: &ToolSpec, ctx: &ToolContext) -> PolicyDecision {
        // 1. Justification
        let reliability_flag = self.reliability_concern(tool, ctx);
        let justification_required = tool.require_justification || reliability_flag.is_some();
        if justification_required && !ctx.has_justification() {
            let reason = match &reliability_flag {
                Some(concern) if !tool.require_justification => {
                    format!("justification required: {}", concern)
                }
                _ => format!("justification required for tool {}", tool.name),
            };
            return PolicyDecision::deny(reason, METHOD_JUSTIFICATION).with_details(DecisionDetails {
                reliability_adjusted: reliability_flag.is_some(),
                ..DecisionDetails::default()
            });
        }

        // every later verdict, allow or deny, carries the reliability flag
        let flagged = DecisionDetails {
            reliability_adjusted: reliability_flag.is_some(),
            reliability_warning: reliability_flag,
            ..DecisionDetails::default()
        };

        // 2. Clearance
        if ctx.clearance_level < tool.min_clearance_level {
            return PolicyDecision::deny(
                format!(
                    "clearance level {} below required {}",
                    ctx.clearance_level, tool.min_clearance_level
                ),
                METHOD_CLEARANCE,
            )
            .with_details(DecisionDetails {
                required_clearance: Some(tool.min_clearance_level),
                ..flagged
            });
        }

        // 3. Scope restriction
        if let Some(allowed) = &tool.allowed_scopes {
            match ctx.scope {
                Some(scope) if allowed.contains(scope) => {}
                Some(scope) => {
                    return PolicyDecision::deny(
                        format!("scope {} not allowed for tool {}", scope, tool.name),
                        METHOD_SCOPE,
                    )
                    .with_details(flagged)
                }
                None => {
                    return PolicyDecision::deny(
                        format!("tool {} requires a scope", tool.name),
                        METHOD_SCOPE,
                    )
                    .with_details(flagged)
                }
            }
        }

        // 4. Classification validity
        if let Some(label) = &ctx.classification {
            if label.parse::<Classification>().is_err() {
                return PolicyDecision::deny(
                    format!("unknown classification: {}", label),
                    METHOD_CLASSIFICATION,
                )
                .with_details(flagged);
            }
        }

        // 5. RBAC
        let mut last_method = METHOD_POLICY.to_string();
        for permission in &tool.required_permissions {
            match self
                .rbac
                .check_permission(ctx.user_id, ctx.org_id, permission)
                .await
            {
                Ok(answer) if answer.allowed => last_method = answer.method,
                Ok(answer) => {
                    return PolicyDecision::deny(answer.reason, answer.method).with_details(
                        DecisionDetails {
                            failed_permission: Some(permission.clone()),
                            ..flagged
                        },
                    );
                }
                Err(e) => {
                    warn!(permission = %permission, error = %e, "RBAC check failed, denying");
                    return PolicyDecision::deny(
                        format!("permission check failed for {}: {}", permission, e),
                        METHOD_RBAC_ERROR,
                    )
                    .with_details(DecisionDetails {
                        failed_permission: Some(permission.clone()),
                        ..flagged
                    });
                }
            }
        }

        // 6. Allow
        PolicyDecision::allow("all policy checks passed", last_method).with_details(flagged)
    }

    /// Describes why the tool's track record demands justification, if it does.
    fn reliability_concern(&self, tool: &ToolSpec, ctx: &ToolContext) -> Option<String> {
        let reliability = ctx.self_model.as_ref()?.reliability(&tool.name)?;
        if reliability.sample_size_30d >= self.config.min_reliability_samples
            && reliability.success_rate_30d < self.config.reliability_threshold
        {
            Some(format!(
                "tool {} success rate {:.2} over {} calls is below {:.2}",
                tool.name,
                reliability.success_rate_30d,
                reliability.sample_size_30d,
                self.config.reliability_threshold
            ))
        } else {
            None
        }
    }
}
