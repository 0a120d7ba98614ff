//! Generation controller: ingest path and single-consumer worker
//!
//! `submit` appends the message to the session, cancels the session's
//! in-flight generation and queues a fresh one, then returns without waiting.
//! One worker task drains the queue, running one generation at a time for
//! the whole process. Queued items whose token was cancelled are skipped.
//!
//! A generation checks its token at five points: after `initial_clusters`,
//! after `updated_clusters`, after each `wepcc_result`, after cross-match and
//! fold, and immediately before the commit. A record that arrives after
//! cancellation is dropped without being broadcast. The commit and the
//! `final_result` broadcast to observers happen under the session write lock,
//! which `reset` also takes, so a reset generation never reports a final
//! result. The external sink sees terminal events after the lock is released.

use super::aggregate::{aggregate, check_sufficiency, ScoringOutcome};
use super::cancel::GenerationToken;
use super::cluster::{ClusterEngine, Clustering};
use super::coverage::{shadow_coverage, CoverageMap};
use super::cross_match::cross_match;
use super::diff::{cluster_count, diff};
use super::events::GenerationEvent;
use super::sink::{EventSink, Observer, SessionBroadcaster};
use super::wepcc::{collect_records, RecordCache, RecordSet};
use crate::collab::embedding::EmbeddingError;
use crate::collab::extraction::ExtractionError;
use crate::collab::message_ids::allocate_message_id;
use crate::collab::Collaborators;
use crate::config::{ConfigError, ScoringConfig};
use crate::session::{
    ChatMessage, GenerationNonce, MessageId, SessionId, SessionSnapshot, SessionStatus, SessionStore,
    SharedSession, UserId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a generation stopped before completing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("generation cancelled")]
    Cancelled,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("pipeline worker error: {0}")]
    Worker(String),
}

/// Errors returned to callers of the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("generation worker has stopped")]
    WorkerStopped,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A chat message as it arrives, before identity resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl IncomingMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Identifies the generation a submitted message triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationHandle {
    pub nonce: GenerationNonce,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

struct WorkItem {
    session_id: SessionId,
    token: GenerationToken,
}

/// State shared between the controller and its worker.
struct Pipeline {
    sessions: SessionStore,
    collaborators: Collaborators,
    config: ScoringConfig,
    broadcaster: SessionBroadcaster,
    sink: Arc<dyn EventSink>,
    idle: Notify,
}

/// Entry point for ingest, reset and observation.
pub struct GenerationController {
    pipeline: Arc<Pipeline>,
    queue: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationController {
    /// Build a controller and spawn its worker. Must be called from within a
    /// tokio runtime.
    ///
    /// Events go to session observers (see [`subscribe`](Self::subscribe))
    /// and to `sink`. An invalid `config` is rejected before the worker spawns.
    pub fn start(
        collaborators: Collaborators,
        config: ScoringConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Self>, ControllerError> {
        config.validate()?;
        let pipeline = Arc::new(Pipeline {
            sessions: SessionStore::new(config.generation_log_limit),
            collaborators,
            config,
            broadcaster: SessionBroadcaster::new(),
            sink,
            idle: Notify::new(),
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&pipeline), receiver));
        info!("generation worker started");

        Ok(Arc::new(Self {
            pipeline,
            queue: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Accept a message and queue a generation for its session.
    ///
    /// Returns `Ok(None)` without side effects when the token does not
    /// resolve to a complete identity.
    pub fn submit(
        &self,
        token: &str,
        message: IncomingMessage,
    ) -> Result<Option<GenerationHandle>, ControllerError> {
        let collab = &self.pipeline.collaborators;
        let Some(identity) = collab.identity.resolve(token).filter(|i| i.is_complete()) else {
            debug!("unresolved identity, message dropped");
            return Ok(None);
        };
        let sender = self
            .queue
            .lock()
            .clone()
            .filter(|s| !s.is_closed())
            .ok_or(ControllerError::WorkerStopped)?;

        let message_id = allocate_message_id(collab.message_ids.as_ref(), MessageId::random);
        let ontology = collab.ontology.as_ref().and_then(|extractor| {
            match extractor.extract(&identity.user_id, &identity.session_id, &message_id, &message.content) {
                Ok(rendered) => Some(rendered),
                Err(e) => {
                    warn!(session = %identity.session_id, user = %identity.user_id, "{}", e);
                    None
                }
            }
        });

        let created_at = Utc::now();
        let token = GenerationToken::new(GenerationNonce::new());
        let session = self.pipeline.sessions.get_or_create(&identity.session_id);
        {
            let mut state = session.write();
            state.append_message(ChatMessage {
                message_id: message_id.clone(),
                user_id: identity.user_id.clone(),
                content: message.content,
                topic: message.topic,
                received_at: created_at,
            });
            if let Some(rendered) = ontology {
                state.append_ontology(rendered);
            }
            if let Some(superseded) = state.install_generation(token.clone()) {
                debug!(session = %identity.session_id, generation = %superseded, "generation superseded");
            }
            sender
                .send(WorkItem {
                    session_id: identity.session_id.clone(),
                    token: token.clone(),
                })
                .map_err(|_| ControllerError::WorkerStopped)?;
        }
        debug!(
            session = %identity.session_id,
            user = %identity.user_id,
            generation = %token.nonce(),
            "generation queued"
        );

        Ok(Some(GenerationHandle {
            nonce: token.nonce(),
            session_id: identity.session_id,
            user_id: identity.user_id,
            message_id,
            created_at,
        }))
    }

    /// Cancel the session's current generation and return it to idle.
    ///
    /// Returns the cancelled generation, if one was queued or running.
    pub fn reset(&self, session_id: &SessionId) -> Option<GenerationNonce> {
        let session = self.pipeline.sessions.get(session_id)?;
        let cancelled = session.write().reset();
        if let Some(nonce) = cancelled {
            info!(session = %session_id, generation = %nonce, "session reset");
        }
        cancelled
    }

    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.pipeline.sessions.snapshot(session_id)
    }

    pub fn status(&self, session_id: &SessionId) -> Option<SessionStatus> {
        self.pipeline.sessions.get(session_id).map(|s| s.read().status())
    }

    /// Observe a session's events from now on.
    pub fn subscribe(&self, session_id: &SessionId) -> Observer {
        self.pipeline.broadcaster.subscribe(session_id)
    }

    /// Wait until the session has no queued or running generation.
    pub async fn wait_idle(&self, session_id: &SessionId) {
        loop {
            let notified = self.pipeline.idle.notified();
            match self.status(session_id) {
                None | Some(SessionStatus::Idle) => return,
                Some(_) => notified.await,
            }
        }
    }

    /// Stop accepting messages and wait for the worker to drain its queue.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("generation worker ended abnormally: {}", e);
            }
        }
        info!("generation worker stopped");
    }
}

async fn run_worker(pipeline: Arc<Pipeline>, mut receiver: mpsc::UnboundedReceiver<WorkItem>) {
    while let Some(item) = receiver.recv().await {
        pipeline.process(item).await;
        pipeline.idle.notify_waiters();
    }
}

fn checkpoint(token: &GenerationToken, stage: &'static str) -> Result<(), PipelineError> {
    if token.is_cancelled() {
        debug!(generation = %token.nonce(), stage, "generation cancelled");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

impl Pipeline {
    fn emit(&self, session_id: &SessionId, event: GenerationEvent) {
        self.broadcaster.emit(session_id, event.clone());
        self.sink.emit(session_id, event);
    }

    async fn process(&self, item: WorkItem) {
        let WorkItem { session_id, token } = item;
        let nonce = token.nonce();
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };
        if token.is_cancelled() || !session.write().mark_running(nonce) {
            debug!(session = %session_id, generation = %nonce, "stale generation skipped");
            return;
        }

        info!(session = %session_id, generation = %nonce, "generation started");
        match self.run_generation(&session_id, &session, &token).await {
            Ok(()) => {
                info!(session = %session_id, generation = %nonce, "generation completed");
            }
            Err(PipelineError::Cancelled) => {
                session.write().record_cancelled(nonce);
            }
            Err(e) if token.is_cancelled() => {
                debug!(session = %session_id, generation = %nonce, "error after cancellation ignored: {}", e);
                session.write().record_cancelled(nonce);
            }
            Err(e) => {
                warn!(session = %session_id, generation = %nonce, "generation failed: {}", e);
                let event = GenerationEvent::GenerationFailed {
                    nonce,
                    reason: e.to_string(),
                };
                {
                    let mut state = session.write();
                    if !state.is_current(nonce) {
                        return;
                    }
                    state.record_failure(nonce, e.to_string());
                    self.broadcaster.emit(&session_id, event.clone());
                }
                self.sink.emit(&session_id, event);
            }
        }
    }

    async fn run_generation(
        &self,
        session_id: &SessionId,
        session: &SharedSession,
        token: &GenerationToken,
    ) -> Result<(), PipelineError> {
        let nonce = token.nonce();
        let (messages, previous, mut cache) = {
            let state = session.read();
            (state.messages_by_user(), state.clustering().clone(), state.records().clone())
        };

        // Stage 1: clustering
        let embedder = Arc::clone(&self.collaborators.embedder);
        let threshold = self.config.distance_threshold;
        let sid = session_id.clone();
        let clustering = tokio::task::spawn_blocking(move || {
            ClusterEngine::new(embedder.as_ref(), threshold).cluster(&messages, &sid, nonce)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;
        debug!(
            session = %session_id,
            generation = %nonce,
            participants = clustering.len(),
            clusters = cluster_count(&clustering),
            "clustering done"
        );
        self.emit(
            session_id,
            GenerationEvent::InitialClusters {
                nonce,
                clusters: clustering.clone(),
            },
        );
        checkpoint(token, "initial_clusters")?;

        // Stage 2: incremental diff
        let changed = diff(&clustering, &previous);
        self.emit(
            session_id,
            GenerationEvent::UpdatedClusters {
                nonce,
                clusters: changed.clone(),
            },
        );
        checkpoint(token, "updated_clusters")?;

        // Stage 3: argument extraction
        self.extract_records(session_id, &clustering, &changed, &mut cache, token)
            .await?;

        // Stage 4: cross-match and fold
        let outcome = match check_sufficiency(&clustering) {
            Err(details) => {
                info!(session = %session_id, generation = %nonce, "insufficient data: {}", details);
                ScoringOutcome::InsufficientData { details }
            }
            Ok(()) => {
                let records = collect_records(&clustering, &cache);
                let (records, coverage) = self.match_and_fold(records).await?;
                checkpoint(token, "coverage")?;
                let scoreboard = aggregate(&coverage, &records, self.config.unaddressed_multiplier);
                ScoringOutcome::Scored { scoreboard }
            }
        };

        // Stage 5: commit
        let event = GenerationEvent::FinalResult {
            nonce,
            outcome: outcome.clone(),
        };
        {
            let mut state = session.write();
            checkpoint(token, "commit")?;
            if !state.is_current(nonce) {
                return Err(PipelineError::Cancelled);
            }
            state.commit(nonce, clustering, cache, outcome);
            self.broadcaster.emit(session_id, event.clone());
        }
        self.sink.emit(session_id, event);
        Ok(())
    }

    /// Extract records for changed clusters and for any cluster whose
    /// fingerprint has no cached record yet.
    async fn extract_records(
        &self,
        session_id: &SessionId,
        clustering: &Clustering,
        changed: &Clustering,
        cache: &mut RecordCache,
        token: &GenerationToken,
    ) -> Result<(), PipelineError> {
        let nonce = token.nonce();
        for (user_id, clusters) in clustering {
            for (cluster_id, cluster) in clusters {
                let is_changed = changed
                    .get(user_id)
                    .is_some_and(|c| c.contains_key(cluster_id));
                let cached = cache.get(&cluster.cluster_hash).cloned();
                if !is_changed && cached.is_some() {
                    continue;
                }

                let record = match cached {
                    Some(record) => {
                        debug!(user = %user_id, cluster = cluster_id, "record reused by fingerprint");
                        record
                    }
                    None => match self.collaborators.extractor.extract(&cluster.sentences).await {
                        Ok(record) => {
                            checkpoint(token, "extraction")?;
                            record
                        }
                        Err(ExtractionError::Malformed(reason)) => {
                            warn!(
                                session = %session_id,
                                user = %user_id,
                                cluster = cluster_id,
                                "extraction output malformed, cluster skipped: {}",
                                reason
                            );
                            checkpoint(token, "wepcc_result")?;
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    },
                };

                cache.insert(cluster.cluster_hash.clone(), record.clone());
                self.emit(
                    session_id,
                    GenerationEvent::WepccResult {
                        nonce,
                        user_id: user_id.clone(),
                        cluster_id: *cluster_id,
                        record,
                    },
                );
                checkpoint(token, "wepcc_result")?;
            }
        }
        Ok(())
    }

    async fn match_and_fold(&self, records: RecordSet) -> Result<(RecordSet, CoverageMap), PipelineError> {
        let embedder = Arc::clone(&self.collaborators.embedder);
        let cutoff = self.config.similarity_cutoff;
        let rescale = self.config.rescale();
        let result = tokio::task::spawn_blocking(move || {
            let modulators = cross_match(&records, embedder.as_ref(), cutoff)?;
            let coverage = shadow_coverage(&modulators, rescale);
            Ok::<_, EmbeddingError>((records, coverage))
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;
        Ok(result)
    }
}
