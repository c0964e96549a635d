// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Static RBAC oracle for single-tenant deployments and tests.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::policy::{RbacChecker, RbacDecision};
use crate::domain::tenant::{OrgId, UserId};

pub const METHOD_STATIC: &str = "static";

/// Grants every permission except an explicit deny list.
#[derive(Debug, Clone, Default)]
pub struct StaticRbacChecker {
    denied: HashSet<String>,
}

impl StaticRbacChecker {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RbacChecker for StaticRbacChecker {
    async fn check_permission(
        &self,
        _user_id: UserId,
        _org_id: OrgId,
        permission: &str,
    ) -> anyhow::Result<RbacDecision> {
        let allowed = !self.denied.contains(permission);
        let reason = if allowed {
            format!("permission {} granted", permission)
        } else {
            format!("permission {} denied", permission)
        };
        Ok(RbacDecision {
            allowed,
            reason,
            method: METHOD_STATIC.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deny_list() {
        let rbac = StaticRbacChecker::deny(["memory:write"]);
        let (user, org) = (UserId::new(), OrgId::new());

        let read = rbac.check_permission(user, org, "memory:read").await.unwrap();
        assert!(read.allowed);
        assert_eq!(read.method, METHOD_STATIC);

        let write = rbac.check_permission(user, org, "memory:write").await.unwrap();
        assert!(!write.allowed);
        assert!(write.reason.contains("memory:write"));
    }
}
