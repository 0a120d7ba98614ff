//! Per-session state
//!
//! The message history is appended by the ingest path only. Pipeline results
//! (clustering, record cache, outcome) are replaced by the generation worker
//! only, in one commit at the end of a generation.

use super::ids::{GenerationNonce, MessageId, SessionId, UserId};
use crate::pipeline::aggregate::ScoringOutcome;
use crate::pipeline::cancel::GenerationToken;
use crate::pipeline::cluster::Clustering;
use crate::pipeline::wepcc::{collect_records, RecordCache, RecordSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Where a session's current generation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "nonce", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Queued(GenerationNonce),
    Running(GenerationNonce),
}

impl SessionStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Completed,
    Cancelled,
    Failed { reason: String },
}

/// Entry in a session's generation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub nonce: GenerationNonce,
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Mutable state of one session.
#[derive(Debug)]
pub struct SessionState {
    session_id: SessionId,
    messages: Vec<ChatMessage>,
    topic: Option<String>,
    ontology: Vec<String>,
    clustering: Clustering,
    records: RecordCache,
    last_outcome: Option<ScoringOutcome>,
    status: SessionStatus,
    current: Option<GenerationToken>,
    log: VecDeque<GenerationLogEntry>,
    log_limit: usize,
}

impl SessionState {
    pub fn new(session_id: SessionId, log_limit: usize) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            topic: None,
            ontology: Vec::new(),
            clustering: Clustering::new(),
            records: RecordCache::new(),
            last_outcome: None,
            status: SessionStatus::Idle,
            current: None,
            log: VecDeque::new(),
            log_limit,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Clustering committed by the last completed generation.
    pub fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    pub fn records(&self) -> &RecordCache {
        &self.records
    }

    /// Append an inbound message; a message carrying a topic replaces the
    /// session topic.
    pub fn append_message(&mut self, message: ChatMessage) {
        if let Some(topic) = &message.topic {
            self.topic = Some(topic.clone());
        }
        self.messages.push(message);
    }

    pub fn append_ontology(&mut self, rendered: String) {
        self.ontology.push(rendered);
    }

    /// Message contents grouped by author, in arrival order.
    pub fn messages_by_user(&self) -> BTreeMap<UserId, Vec<String>> {
        let mut grouped: BTreeMap<UserId, Vec<String>> = BTreeMap::new();
        for message in &self.messages {
            grouped
                .entry(message.user_id.clone())
                .or_default()
                .push(message.content.clone());
        }
        grouped
    }

    /// Cancel whatever generation is current and make `token` current.
    ///
    /// Returns the nonce of the superseded generation, if there was one.
    pub fn install_generation(&mut self, token: GenerationToken) -> Option<GenerationNonce> {
        let superseded = self.current.take().map(|old| {
            old.cancel();
            old.nonce()
        });
        self.status = SessionStatus::Queued(token.nonce());
        self.current = Some(token);
        superseded
    }

    /// True while `nonce` is the session's current generation.
    pub fn is_current(&self, nonce: GenerationNonce) -> bool {
        self.current.as_ref().is_some_and(|t| t.nonce() == nonce)
    }

    /// Move a queued generation to running. False if it is no longer current.
    pub fn mark_running(&mut self, nonce: GenerationNonce) -> bool {
        if !self.is_current(nonce) {
            return false;
        }
        self.status = SessionStatus::Running(nonce);
        true
    }

    /// Replace pipeline results with those of a finished generation.
    ///
    /// The record cache keeps only fingerprints present in `clustering`.
    pub fn commit(
        &mut self,
        nonce: GenerationNonce,
        clustering: Clustering,
        mut records: RecordCache,
        outcome: ScoringOutcome,
    ) {
        let live: HashSet<&str> = clustering
            .values()
            .flat_map(|clusters| clusters.values().map(|c| c.cluster_hash.as_str()))
            .collect();
        records.retain(|fingerprint, _| live.contains(fingerprint.as_str()));

        self.clustering = clustering;
        self.records = records;
        self.last_outcome = Some(outcome);
        self.finish(nonce, GenerationOutcome::Completed);
    }

    /// Close a failed generation. Pipeline results stay as they were.
    pub fn record_failure(&mut self, nonce: GenerationNonce, reason: String) {
        if self.is_current(nonce) {
            self.finish(nonce, GenerationOutcome::Failed { reason });
        }
    }

    /// Close a cancelled generation if the session still references it.
    pub fn record_cancelled(&mut self, nonce: GenerationNonce) {
        if self.is_current(nonce) {
            self.finish(nonce, GenerationOutcome::Cancelled);
        }
    }

    /// Cancel the current generation, if any, and return to idle.
    pub fn reset(&mut self) -> Option<GenerationNonce> {
        let nonce = self.current.as_ref().map(|t| {
            t.cancel();
            t.nonce()
        })?;
        self.finish(nonce, GenerationOutcome::Cancelled);
        Some(nonce)
    }

    fn finish(&mut self, nonce: GenerationNonce, outcome: GenerationOutcome) {
        self.current = None;
        self.status = SessionStatus::Idle;
        self.log.push_back(GenerationLogEntry {
            nonce,
            outcome,
            finished_at: Utc::now(),
        });
        while self.log.len() > self.log_limit {
            self.log.pop_front();
        }
    }

    /// Owned copy of everything observers may read.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            messages: self.messages.clone(),
            topic: self.topic.clone(),
            ontology: self.ontology.clone(),
            records: collect_records(&self.clustering, &self.records),
            clustering: self.clustering.clone(),
            last_outcome: self.last_outcome.clone(),
            status: self.status,
            generation_log: self.log.iter().cloned().collect(),
        }
    }
}

/// Point-in-time copy of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub messages: Vec<ChatMessage>,
    pub topic: Option<String>,
    pub ontology: Vec<String>,
    pub clustering: Clustering,
    pub records: RecordSet,
    pub last_outcome: Option<ScoringOutcome>,
    pub status: SessionStatus,
    pub generation_log: Vec<GenerationLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregate::Scoreboard;
    use crate::pipeline::cluster::Cluster;

    fn message(user: &str, content: &str, topic: Option<&str>) -> ChatMessage {
        ChatMessage {
            message_id: MessageId::random(),
            user_id: UserId::from(user),
            content: content.to_string(),
            topic: topic.map(str::to_string),
            received_at: Utc::now(),
        }
    }

    fn scored() -> ScoringOutcome {
        ScoringOutcome::Scored {
            scoreboard: Scoreboard::default(),
        }
    }

    #[test]
    fn messages_group_by_user_in_order() {
        let mut state = SessionState::new(SessionId::from("s"), 8);
        state.append_message(message("bob", "one", Some("games")));
        state.append_message(message("alice", "two", None));
        state.append_message(message("bob", "three", None));

        let grouped = state.messages_by_user();
        assert_eq!(grouped[&UserId::from("bob")], vec!["one", "three"]);
        assert_eq!(grouped[&UserId::from("alice")], vec!["two"]);
        assert_eq!(state.snapshot().topic.as_deref(), Some("games"));
    }

    #[test]
    fn installing_a_generation_cancels_the_previous_one() {
        let mut state = SessionState::new(SessionId::from("s"), 8);
        let first = GenerationToken::new(GenerationNonce::new());
        let second = GenerationToken::new(GenerationNonce::new());

        assert_eq!(state.install_generation(first.clone()), None);
        assert_eq!(state.install_generation(second.clone()), Some(first.nonce()));

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!state.is_current(first.nonce()));
        assert_eq!(state.status(), SessionStatus::Queued(second.nonce()));
        assert!(!state.mark_running(first.nonce()));
        assert!(state.mark_running(second.nonce()));
    }

    #[test]
    fn commit_prunes_cache_and_returns_to_idle() {
        let mut state = SessionState::new(SessionId::from("s"), 8);
        let token = GenerationToken::new(GenerationNonce::new());
        state.install_generation(token.clone());

        let alice = UserId::from("alice");
        let cluster = Cluster::new(0, vec!["a".into()], alice.clone(), SessionId::from("s"), token.nonce());
        let mut clustering = Clustering::new();
        clustering.insert(alice, BTreeMap::from([(0, cluster.clone())]));

        let record = crate::pipeline::wepcc::WepccRecord {
            warrant: String::new(),
            evidence: String::new(),
            persuasiveness: crate::pipeline::wepcc::Persuasiveness::parse("{}"),
            claim: String::new(),
            counterclaim: String::new(),
        };
        let cache = RecordCache::from([
            (cluster.cluster_hash.clone(), record.clone()),
            ("stale".to_string(), record),
        ]);

        state.commit(token.nonce(), clustering, cache, scored());
        assert_eq!(state.records().len(), 1);
        assert_eq!(state.status(), SessionStatus::Idle);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.generation_log[0].outcome, GenerationOutcome::Completed);
        assert_eq!(snapshot.last_outcome, Some(scored()));
    }

    #[test]
    fn reset_cancels_and_logs() {
        let mut state = SessionState::new(SessionId::from("s"), 8);
        assert_eq!(state.reset(), None);

        let token = GenerationToken::new(GenerationNonce::new());
        state.install_generation(token.clone());
        assert_eq!(state.reset(), Some(token.nonce()));
        assert!(token.is_cancelled());
        assert!(state.status().is_idle());
        assert_eq!(
            state.snapshot().generation_log[0].outcome,
            GenerationOutcome::Cancelled
        );
    }

    #[test]
    fn stale_failures_are_not_recorded() {
        let mut state = SessionState::new(SessionId::from("s"), 8);
        let old = GenerationToken::new(GenerationNonce::new());
        let new = GenerationToken::new(GenerationNonce::new());
        state.install_generation(old.clone());
        state.install_generation(new.clone());

        state.record_failure(old.nonce(), "late".into());
        state.record_cancelled(old.nonce());
        assert!(state.snapshot().generation_log.is_empty());
        assert_eq!(state.status(), SessionStatus::Queued(new.nonce()));
    }

    #[test]
    fn generation_log_is_bounded() {
        let mut state = SessionState::new(SessionId::from("s"), 2);
        for _ in 0..5 {
            let token = GenerationToken::new(GenerationNonce::new());
            state.install_generation(token.clone());
            state.record_failure(token.nonce(), "down".into());
        }
        assert_eq!(state.snapshot().generation_log.len(), 2);
    }
}
