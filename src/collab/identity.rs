//! Session identity resolution boundary
//!
//! The transport hands the controller an opaque token; a resolver maps it to
//! the participant and session it was issued for. An unresolvable token makes
//! ingest a no-op.

use crate::session::{SessionId, UserId};
use dashmap::DashMap;

/// Who sent a message, and into which session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub session_id: SessionId,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, session_id: impl Into<SessionId>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Both halves must be non-empty for the identity to be usable.
    pub fn is_complete(&self) -> bool {
        !self.user_id.as_str().is_empty() && !self.session_id.as_str().is_empty()
    }
}

/// Resolves an opaque token to an identity.
pub trait IdentityResolver: Send + Sync {
    /// `None` for invalid, expired or unknown tokens.
    fn resolve(&self, token: &str) -> Option<Identity>;
}

/// Token table issued up front (tests, transcript replay).
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    tokens: DashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for an identity, replacing any previous mapping.
    pub fn issue(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.insert(token.into(), identity);
    }

    /// Builder form of [`issue`](Self::issue).
    pub fn with_token(self, token: impl Into<String>, identity: Identity) -> Self {
        self.issue(token, identity);
        self
    }

    /// Invalidate a token.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).map(|r| r.value().clone())
    }
}
