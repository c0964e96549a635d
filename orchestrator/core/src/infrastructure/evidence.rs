// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory evidence source.
//!
//! Cards match a goal when any goal term (case-insensitive, longer than three characters)
//! appears in the card title or excerpt. Matches are returned by descending
//! `score`. An empty goal matches everything.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::agents::{EvidenceCard, EvidenceRetriever};
use crate::domain::tenant::OrgId;

#[derive(Clone, Default)]
pub struct InMemoryEvidenceRetriever {
    cards: Arc<RwLock<HashMap<OrgId, Vec<EvidenceCard>>>>,
}

impl InMemoryEvidenceRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, org_id: OrgId, card: EvidenceCard) {
        self.cards.write().entry(org_id).or_default().push(card);
    }

    pub fn with_cards(self, org_id: OrgId, cards: impl IntoIterator<Item = EvidenceCard>) -> Self {
        for card in cards {
            self.add(org_id, card);
        }
        self
    }
}

fn terms(goal: &str) -> Vec<String> {
    goal.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl EvidenceRetriever for InMemoryEvidenceRetriever {
    async fn retrieve_evidence(
        &self,
        org_id: OrgId,
        goal: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<EvidenceCard>> {
        let terms = terms(goal);
        let cards = self.cards.read();
        let mut matched: Vec<EvidenceCard> = cards
            .get(&org_id)
            .map(|cards| {
                cards
                    .iter()
                    .filter(|card| {
                        if terms.is_empty() {
                            return true;
                        }
                        let haystack = format!("{} {}", card.title, card.excerpt).to_lowercase();
                        terms.iter().any(|t| haystack.contains(t.as_str()))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by(|a, b| b.score.total_cmp(&a.score));
        matched.truncate(limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::MemoryId;

    fn card(title: &str, score: f64) -> EvidenceCard {
        EvidenceCard {
            memory_id: MemoryId::new(),
            title: title.to_string(),
            excerpt: String::new(),
            score,
            classification: None,
        }
    }

    #[tokio::test]
    async fn test_matches_ranked_and_limited() {
        let org = OrgId::new();
        let retriever = InMemoryEvidenceRetriever::new().with_cards(
            org,
            vec![
                card("Incident 42 timeline", 0.4),
                card("Quarterly budget", 0.9),
                card("Incident postmortem", 0.8),
                card("incident pager rota", 0.1),
            ],
        );

        let found = retriever
            .retrieve_evidence(org, "summarise the incident", 2)
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Incident postmortem", "Incident 42 timeline"]);
    }

    #[tokio::test]
    async fn test_other_org_sees_nothing() {
        let org = OrgId::new();
        let retriever = InMemoryEvidenceRetriever::new().with_cards(org, vec![card("Incident", 1.0)]);
        assert!(retriever
            .retrieve_evidence(OrgId::new(), "incident", 5)
            .await
            .unwrap()
            .is_empty());
    }
}
