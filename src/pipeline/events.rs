//! Broadcast events emitted while a generation runs
//!
//! Every event carries the generation nonce so observers can drop output
//! from superseded generations.

use super::aggregate::ScoringOutcome;
use super::cluster::Clustering;
use super::wepcc::WepccRecord;
use crate::session::{ClusterId, GenerationNonce, UserId};
use serde::{Deserialize, Serialize};

/// An event pushed to a session's observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// Full clustering of the current message history
    InitialClusters {
        nonce: GenerationNonce,
        clusters: Clustering,
    },
    /// Clusters that will be pushed into extraction
    UpdatedClusters {
        nonce: GenerationNonce,
        clusters: Clustering,
    },
    /// One extracted argument record
    WepccResult {
        nonce: GenerationNonce,
        user_id: UserId,
        cluster_id: ClusterId,
        record: WepccRecord,
    },
    /// Final ranked scores (or why none could be computed)
    FinalResult {
        nonce: GenerationNonce,
        outcome: ScoringOutcome,
    },
    /// A collaborator failed; the generation produced no result
    GenerationFailed {
        nonce: GenerationNonce,
        reason: String,
    },
}

impl GenerationEvent {
    pub fn nonce(&self) -> GenerationNonce {
        match self {
            Self::InitialClusters { nonce, .. }
            | Self::UpdatedClusters { nonce, .. }
            | Self::WepccResult { nonce, .. }
            | Self::FinalResult { nonce, .. }
            | Self::GenerationFailed { nonce, .. } => *nonce,
        }
    }

    /// Wire name of the event, as found in the `status` field.
    pub fn status(&self) -> &'static str {
        match self {
            Self::InitialClusters { .. } => "initial_clusters",
            Self::UpdatedClusters { .. } => "updated_clusters",
            Self::WepccResult { .. } => "wepcc_result",
            Self::FinalResult { .. } => "final_result",
            Self::GenerationFailed { .. } => "generation_failed",
        }
    }

    /// True for events after which the generation emits nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalResult { .. } | Self::GenerationFailed { .. })
    }
}
