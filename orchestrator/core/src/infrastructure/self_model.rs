// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::self_model::{SelfModel, SelfModelProvider};
use crate::domain::tenant::OrgId;

/// Self-model snapshots held in memory, set per org by whatever computes them.
#[derive(Clone, Default)]
pub struct StaticSelfModelProvider {
    models: Arc<RwLock<HashMap<OrgId, SelfModel>>>,
}

impl StaticSelfModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, org_id: OrgId, model: SelfModel) -> Self {
        self.set(org_id, model);
        self
    }

    pub fn set(&self, org_id: OrgId, model: SelfModel) {
        self.models.write().insert(org_id, model);
    }
}

#[async_trait]
impl SelfModelProvider for StaticSelfModelProvider {
    async fn snapshot(&self, org_id: OrgId) -> anyhow::Result<Option<SelfModel>> {
        Ok(self.models.read().get(&org_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_per_org() {
        let org = OrgId::new();
        let model = SelfModel {
            low_confidence_domains: vec!["billing".into()],
            ..SelfModel::default()
        };
        let provider = StaticSelfModelProvider::new().with_model(org, model.clone());

        assert_eq!(provider.snapshot(org).await.unwrap(), Some(model));
        assert!(provider.snapshot(OrgId::new()).await.unwrap().is_none());
    }
}
