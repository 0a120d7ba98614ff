//! Session-scoped state store
//!
//! One `SessionState` per session behind its own lock, so sessions never
//! contend with each other.

use super::ids::SessionId;
use super::state::{SessionSnapshot, SessionState};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to one session's state.
pub type SharedSession = Arc<RwLock<SessionState>>;

/// All sessions known to a controller.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SharedSession>,
    log_limit: usize,
}

impl SessionStore {
    /// `log_limit` bounds each session's generation log.
    pub fn new(log_limit: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            log_limit,
        }
    }

    /// Get a session, creating an empty one on first use.
    pub fn get_or_create(&self, session_id: &SessionId) -> SharedSession {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %session_id, "session created");
                Arc::new(RwLock::new(SessionState::new(session_id.clone(), self.log_limit)))
            })
            .clone()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SharedSession> {
        self.sessions.get(session_id).map(|r| r.clone())
    }

    /// Clone a session's state under a short read lock.
    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.get(session_id).map(|session| session.read().snapshot())
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
