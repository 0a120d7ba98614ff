//! Aggregation and ranking
//!
//! Turns shadow coverage and persuasiveness into per-participant scores.
//! A cluster some other participant engaged is "addressed" and keeps only its
//! uncovered share of persuasiveness; a cluster nobody engaged is
//! "unaddressed" and is weighted by the unaddressed multiplier.

use super::cluster::Clustering;
use super::coverage::CoverageMap;
use super::wepcc::RecordSet;
use crate::session::{ClusterId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a cluster contributed to its author's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Addressed,
    Unaddressed,
}

/// One cluster's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterContribution {
    pub cluster_id: ClusterId,
    pub kind: ContributionKind,
    pub score: f64,
}

/// A participant's total and its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantScore {
    pub user_id: UserId,
    pub total_score: f64,
    pub clusters: Vec<ClusterContribution>,
}

impl ParticipantScore {
    /// Contributions of one kind.
    pub fn contributions(&self, kind: ContributionKind) -> impl Iterator<Item = &ClusterContribution> {
        self.clusters.iter().filter(move |c| c.kind == kind)
    }
}

/// Participants ranked by total score, highest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    pub participants: Vec<ParticipantScore>,
}

impl Scoreboard {
    pub fn get(&self, user_id: &UserId) -> Option<&ParticipantScore> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    /// Leading participant, if any.
    pub fn leader(&self) -> Option<&ParticipantScore> {
        self.participants.first()
    }
}

/// Why scoring was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientData {
    /// Rebuttal coverage needs at least two sides.
    TooFewParticipants { participants: usize },
    /// A participant ended up with no clusters.
    EmptyParticipant { user_id: UserId },
}

impl std::fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewParticipants { participants } => {
                write!(f, "{} clustered participant(s), need at least 2", participants)
            }
            Self::EmptyParticipant { user_id } => write!(f, "participant {} has no clusters", user_id),
        }
    }
}

/// Result of a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoringOutcome {
    Scored { scoreboard: Scoreboard },
    InsufficientData { details: InsufficientData },
}

impl ScoringOutcome {
    pub fn scoreboard(&self) -> Option<&Scoreboard> {
        match self {
            Self::Scored { scoreboard } => Some(scoreboard),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

/// Matching needs at least two clustered participants, each with a cluster.
pub fn check_sufficiency(clustering: &Clustering) -> Result<(), InsufficientData> {
    if clustering.len() < 2 {
        return Err(InsufficientData::TooFewParticipants {
            participants: clustering.len(),
        });
    }
    if let Some((user_id, _)) = clustering.iter().find(|(_, clusters)| clusters.is_empty()) {
        return Err(InsufficientData::EmptyParticipant {
            user_id: user_id.clone(),
        });
    }
    Ok(())
}

/// Score every participant's recorded clusters and rank the participants.
///
/// Clusters with malformed persuasiveness are left out of the total.
pub fn aggregate(coverage: &CoverageMap, records: &RecordSet, unaddressed_multiplier: f64) -> Scoreboard {
    let mut participants = Vec::with_capacity(records.len());

    for (user_id, clusters) in records {
        let user_coverage = coverage.get(user_id);
        let mut contributions = Vec::with_capacity(clusters.len());

        for (cluster_id, record) in clusters {
            let Some(persuasiveness) = record.persuasiveness.score() else {
                tracing::warn!(
                    user = %user_id,
                    cluster = cluster_id,
                    "malformed persuasiveness justification, cluster excluded from score"
                );
                continue;
            };

            let contribution = match user_coverage.and_then(|c| c.get(cluster_id)) {
                Some(shadow) => ClusterContribution {
                    cluster_id: *cluster_id,
                    kind: ContributionKind::Addressed,
                    score: (1.0 - shadow) * persuasiveness,
                },
                None => ClusterContribution {
                    cluster_id: *cluster_id,
                    kind: ContributionKind::Unaddressed,
                    score: persuasiveness * unaddressed_multiplier,
                },
            };
            tracing::debug!(
                user = %user_id,
                cluster = cluster_id,
                kind = ?contribution.kind,
                score = contribution.score,
                "cluster contribution"
            );
            contributions.push(contribution);
        }

        let total_score = contributions.iter().map(|c| c.score).sum();
        participants.push(ParticipantScore {
            user_id: user_id.clone(),
            total_score,
            clusters: contributions,
        });
    }

    participants.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    Scoreboard { participants }
}
