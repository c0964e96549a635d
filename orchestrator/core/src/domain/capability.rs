// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Tokens
//!
//! A [`CapabilityToken`] is a short-lived credential granting a closed set of
//! [`Scope`]s to one actor inside one org. Tokens are immutable once issued:
//! the only time-dependent property is expiry, which is evaluated at use time
//! by [`CapabilityToken::validate`], never at issuance.
//!
//! ## Scope Set
//!
//! Scopes are a closed enum packed into a [`ScopeSet`] bitmask. Adding a
//! variant without assigning it a bit is a compile error (the `bit()` match is
//! exhaustive).
//!
//! | Scope | Wire name |
//! |-------|-----------|
//! | `Read` | `read` |
//! | `Append` | `append` |
//! | `Search` | `search` |
//! | `Upsert` | `upsert` |
//! | `Consolidate` | `consolidate` |
//! | `Promote` | `promote` |
//! | `Feedback` | `feedback` |
//! | `SchedulerEnqueue` | `scheduler.enqueue` |
//! | `SchedulerDequeue` | `scheduler.dequeue` |
//! | `SchedulerUpdate` | `scheduler.update` |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::tenant::{OrgId, UserId};
use crate::domain::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One named operation category a token may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "append")]
    Append,
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "upsert")]
    Upsert,
    #[serde(rename = "consolidate")]
    Consolidate,
    #[serde(rename = "promote")]
    Promote,
    #[serde(rename = "feedback")]
    Feedback,
    #[serde(rename = "scheduler.enqueue")]
    SchedulerEnqueue,
    #[serde(rename = "scheduler.dequeue")]
    SchedulerDequeue,
    #[serde(rename = "scheduler.update")]
    SchedulerUpdate,
}

impl Scope {
    pub const ALL: [Scope; 10] = [
        Scope::Read,
        Scope::Append,
        Scope::Search,
        Scope::Upsert,
        Scope::Consolidate,
        Scope::Promote,
        Scope::Feedback,
        Scope::SchedulerEnqueue,
        Scope::SchedulerDequeue,
        Scope::SchedulerUpdate,
    ];

    const fn bit(self) -> u16 {
        match self {
            Scope::Read => 1 << 0,
            Scope::Append => 1 << 1,
            Scope::Search => 1 << 2,
            Scope::Upsert => 1 << 3,
            Scope::Consolidate => 1 << 4,
            Scope::Promote => 1 << 5,
            Scope::Feedback => 1 << 6,
            Scope::SchedulerEnqueue => 1 << 7,
            Scope::SchedulerDequeue => 1 << 8,
            Scope::SchedulerUpdate => 1 << 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Append => "append",
            Scope::Search => "search",
            Scope::Upsert => "upsert",
            Scope::Consolidate => "consolidate",
            Scope::Promote => "promote",
            Scope::Feedback => "feedback",
            Scope::SchedulerEnqueue => "scheduler.enqueue",
            Scope::SchedulerDequeue => "scheduler.dequeue",
            Scope::SchedulerUpdate => "scheduler.update",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s.trim())
            .ok_or_else(|| CapabilityError::UnknownScope(s.to_string()))
    }
}

/// Bitmask set of [`Scope`]s. Serialized as a list of wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScopeSet(u16);

impl ScopeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Scope::ALL.iter().copied().collect()
    }

    pub const fn with(self, scope: Scope) -> Self {
        Self(self.0 | scope.bit())
    }

    pub fn insert(&mut self, scope: Scope) {
        self.0 |= scope.bit();
    }

    pub const fn contains(&self, scope: Scope) -> bool {
        self.0 & scope.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        Scope::ALL.iter().copied().filter(move |s| self.contains(*s))
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        let mut set = ScopeSet::empty();
        for scope in iter {
            set.insert(scope);
        }
        set
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let scopes: Vec<Scope> = self.iter().collect();
        scopes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let scopes = Vec::<Scope>::deserialize(deserializer)?;
        Ok(scopes.into_iter().collect())
    }
}

/// Raised when a token cannot authorize an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability token expired")]
    Expired,

    #[error("capability token missing scope: {scope}")]
    MissingScope { scope: Scope },

    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("invalid token ttl: {0}")]
    InvalidTtl(String),
}

/// Scoped, TTL-bound credential. Fields are private so scopes cannot be
/// widened after issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityToken {
    token_id: TokenId,
    org_id: OrgId,
    session_id: Option<SessionId>,
    agent_id: Option<String>,
    actor_user_id: UserId,
    scopes: ScopeSet,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CapabilityToken {
    /// Build a token valid for `ttl` starting at `issued_at`.
    pub fn issue(
        org_id: OrgId,
        actor_user_id: UserId,
        scopes: ScopeSet,
        session_id: Option<SessionId>,
        agent_id: Option<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, CapabilityError> {
        if ttl <= Duration::zero() {
            return Err(CapabilityError::InvalidTtl(format!(
                "{}s",
                ttl.num_seconds()
            )));
        }
        Ok(Self {
            token_id: TokenId::new(),
            org_id,
            session_id,
            agent_id,
            actor_user_id,
            scopes,
            issued_at,
            expires_at: issued_at + ttl,
        })
    }

    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn actor_user_id(&self) -> UserId {
        self.actor_user_id
    }

    pub fn scopes(&self) -> ScopeSet {
        self.scopes
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(scope)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A token is expired from `expires_at` onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check expiry then scope. Callers must not proceed on `Err`.
    pub fn validate(&self, required: Scope) -> Result<(), CapabilityError> {
        self.validate_at(required, Utc::now())
    }

    pub fn validate_at(&self, required: Scope, now: DateTime<Utc>) -> Result<(), CapabilityError> {
        if self.is_expired_at(now) {
            return Err(CapabilityError::Expired);
        }
        if !self.has_scope(required) {
            return Err(CapabilityError::MissingScope { scope: required });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn token_with(scopes: ScopeSet, ttl: Duration) -> CapabilityToken {
        CapabilityToken::issue(
            OrgId::new(),
            UserId::new(),
            scopes,
            None,
            None,
            Utc::now(),
            ttl,
        )
        .unwrap()
    }

    #[test]
    fn test_scope_set_membership() {
        let set: ScopeSet = [Scope::Read, Scope::Search].into_iter().collect();
        assert!(set.contains(Scope::Read));
        assert!(set.contains(Scope::Search));
        assert!(!set.contains(Scope::Append));
        assert_eq!(set.len(), 2);
        assert_eq!(ScopeSet::all().len(), Scope::ALL.len());
    }

    #[test]
    fn test_scope_set_serializes_as_wire_names() {
        let set = ScopeSet::empty()
            .with(Scope::Read)
            .with(Scope::SchedulerEnqueue);
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json, serde_json::json!(["read", "scheduler.enqueue"]));

        let back: ScopeSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("scheduler.update".parse::<Scope>().unwrap(), Scope::SchedulerUpdate);
        assert!(matches!(
            "delete".parse::<Scope>(),
            Err(CapabilityError::UnknownScope(_))
        ));
    }

    #[test]
    fn test_validate_missing_scope_names_scope() {
        let token = token_with(ScopeSet::empty().with(Scope::Read), Duration::hours(1));
        assert!(token.validate(Scope::Read).is_ok());

        let err = token.validate(Scope::Promote).unwrap_err();
        assert_eq!(err, CapabilityError::MissingScope { scope: Scope::Promote });
        assert!(err.to_string().contains("promote"));
    }

    #[test]
    fn test_expiry_is_checked_at_use_time() {
        let token = token_with(ScopeSet::all(), Duration::seconds(60));
        assert!(token.validate(Scope::Read).is_ok());

        let later = token.expires_at() + Duration::seconds(1);
        assert_eq!(
            token.validate_at(Scope::Read, later),
            Err(CapabilityError::Expired)
        );
        assert!(token.is_expired_at(token.expires_at()));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let result = CapabilityToken::issue(
            OrgId::new(),
            UserId::new(),
            ScopeSet::all(),
            None,
            None,
            Utc::now(),
            Duration::zero(),
        );
        assert!(matches!(result, Err(CapabilityError::InvalidTtl(_))));
    }

    proptest! {
        #[test]
        fn prop_validate_fails_iff_expired_or_missing(
            mask in 0u16..(1 << 10),
            required_idx in 0usize..10,
            offset_secs in -120i64..120,
        ) {
            let scopes: ScopeSet = Scope::ALL
                .iter()
                .copied()
                .filter(|s| mask & s.bit() != 0)
                .collect();
            let token = token_with(scopes, Duration::seconds(60));
            let required = Scope::ALL[required_idx];
            let now = token.expires_at() + Duration::seconds(offset_secs);

            let expected_err = token.is_expired_at(now) || !token.has_scope(required);
            prop_assert_eq!(token.validate_at(required, now).is_err(), expected_err);
        }
    }
}
