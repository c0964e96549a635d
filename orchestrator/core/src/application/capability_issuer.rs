// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Issuer
//!
//! Mints [`CapabilityToken`]s from named presets and persists them so they
//! can be resolved by id later.
//!
//! | Preset | Scopes | TTL |
//! |--------|--------|-----|
//! | `read` | read, search | `default_ttl` |
//! | `write` | append, upsert, feedback | `default_ttl` |
//! | `admin` | every scope | `default_ttl` |
//! | `agent` | search, append | `agent_ttl` |
//! | `scheduler` | scheduler.enqueue, scheduler.dequeue, scheduler.update | `default_ttl` |

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::capability::{CapabilityError, CapabilityToken, Scope, ScopeSet, TokenId};
use crate::domain::config::TokenConfig;
use crate::domain::repository::{RepositoryError, TokenRepository};
use crate::domain::session::SessionId;
use crate::domain::tenant::{OrgId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPreset {
    Read,
    Write,
    Admin,
    Agent,
    Scheduler,
}

impl TokenPreset {
    pub fn scopes(&self) -> ScopeSet {
        match self {
            TokenPreset::Read => ScopeSet::empty().with(Scope::Read).with(Scope::Search),
            TokenPreset::Write => ScopeSet::empty()
                .with(Scope::Append)
                .with(Scope::Upsert)
                .with(Scope::Feedback),
            TokenPreset::Admin => ScopeSet::all(),
            TokenPreset::Agent => ScopeSet::empty().with(Scope::Search).with(Scope::Append),
            TokenPreset::Scheduler => ScopeSet::empty()
                .with(Scope::SchedulerEnqueue)
                .with(Scope::SchedulerDequeue)
                .with(Scope::SchedulerUpdate),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CapabilityIssuer {
    tokens: Arc<dyn TokenRepository>,
    config: TokenConfig,
}

impl CapabilityIssuer {
    pub fn new(tokens: Arc<dyn TokenRepository>, config: TokenConfig) -> Self {
        Self { tokens, config }
    }

    /// Issue a token with an explicit scope set and TTL.
    pub async fn issue(
        &self,
        org_id: OrgId,
        actor_user_id: UserId,
        scopes: ScopeSet,
        session_id: Option<SessionId>,
        agent_id: Option<String>,
        ttl: std::time::Duration,
    ) -> Result<CapabilityToken, IssuerError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CapabilityError::InvalidTtl(e.to_string()))?;
        let token = CapabilityToken::issue(
            org_id,
            actor_user_id,
            scopes,
            session_id,
            agent_id,
            Utc::now(),
            ttl,
        )?;
        self.tokens.save(&token).await?;

        info!(
            token_id = %token.token_id(),
            org_id = %org_id,
            scopes = ?scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            expires_at = %token.expires_at(),
            "Issued capability token"
        );
        Ok(token)
    }

    pub async fn issue_preset(
        &self,
        preset: TokenPreset,
        org_id: OrgId,
        actor_user_id: UserId,
        session_id: Option<SessionId>,
        agent_id: Option<String>,
    ) -> Result<CapabilityToken, IssuerError> {
        let ttl = match preset {
            TokenPreset::Agent => self.config.agent_ttl,
            _ => self.config.default_ttl,
        };
        self.issue(org_id, actor_user_id, preset.scopes(), session_id, agent_id, ttl)
            .await
    }

    pub async fn issue_read(&self, org_id: OrgId, user: UserId) -> Result<CapabilityToken, IssuerError> {
        self.issue_preset(TokenPreset::Read, org_id, user, None, None).await
    }

    pub async fn issue_write(&self, org_id: OrgId, user: UserId) -> Result<CapabilityToken, IssuerError> {
        self.issue_preset(TokenPreset::Write, org_id, user, None, None).await
    }

    pub async fn issue_admin(&self, org_id: OrgId, user: UserId) -> Result<CapabilityToken, IssuerError> {
        self.issue_preset(TokenPreset::Admin, org_id, user, None, None).await
    }

    pub async fn issue_scheduler(&self, org_id: OrgId, user: UserId) -> Result<CapabilityToken, IssuerError> {
        self.issue_preset(TokenPreset::Scheduler, org_id, user, None, None).await
    }

    /// Short-lived token bound to one agent acting inside one session.
    pub async fn issue_agent(
        &self,
        org_id: OrgId,
        user: UserId,
        session_id: SessionId,
        agent_id: impl Into<String>,
    ) -> Result<CapabilityToken, IssuerError> {
        self.issue_preset(
            TokenPreset::Agent,
            org_id,
            user,
            Some(session_id),
            Some(agent_id.into()),
        )
        .await
    }

    /// Look up a persisted token. Expired tokens are returned as stored;
    /// callers still have to `validate` before use.
    pub async fn resolve(&self, token_id: TokenId) -> Result<Option<CapabilityToken>, IssuerError> {
        let token = self.tokens.find_by_id(token_id).await?;
        debug!(token_id = %token_id, found = token.is_some(), "Resolved capability token");
        Ok(token)
    }
}
