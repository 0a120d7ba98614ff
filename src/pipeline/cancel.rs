//! Cooperative cancellation keyed by generation nonce
//!
//! The controller cancels a session's token the moment a newer generation
//! (or a reset) arrives. The running task checks its token at each stage
//! boundary. Work already broadcast stays visible; nothing further commits.

use crate::session::GenerationNonce;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation token bound to one generation.
///
/// The controller sets the token; the pipeline checks it between stages.
/// Cancellation during a collaborator call has no effect until the next check.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    nonce: GenerationNonce,
    cancelled: Arc<AtomicBool>,
}

impl GenerationToken {
    pub fn new(nonce: GenerationNonce) -> Self {
        Self {
            nonce,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The generation this token belongs to.
    pub fn nonce(&self) -> GenerationNonce {
        self.nonce
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
