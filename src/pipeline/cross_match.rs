//! Cross-match stage: counterclaims against other participants' claims
//!
//! For every ordered pair of clusters (A, B) owned by different participants,
//! A's counterclaim is compared with B's claim by cosine similarity. Above the
//! cutoff, the similarity is rescaled into (0,1] and recorded on A's modulator
//! list, tagged with B. (A, B) and (B, A) are independent checks.

use super::wepcc::RecordSet;
use crate::collab::embedding::{cosine_similarity, embed_checked, Embedder, EmbeddingError};
use crate::session::{ClusterId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One other-participant claim that engages a cluster's counterclaim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulatorEntry {
    /// `(similarity - cutoff) / (1 - cutoff)`, in (0,1]
    pub value: f64,
    pub similarity: f64,
    pub matched_user: UserId,
    pub matched_cluster: ClusterId,
}

/// Modulator list for every cluster that has a record (possibly empty).
pub type ModulatorMap = BTreeMap<UserId, BTreeMap<ClusterId, Vec<ModulatorEntry>>>;

/// Rescale a similarity above `cutoff` into (0,1].
pub fn normalize_similarity(similarity: f64, cutoff: f64) -> f64 {
    ((similarity - cutoff) / (1.0 - cutoff)).min(1.0)
}

/// Match every counterclaim against every other participant's claims.
///
/// Each distinct claim/counterclaim text is embedded once, in a single batch.
pub fn cross_match(
    records: &RecordSet,
    embedder: &dyn Embedder,
    cutoff: f64,
) -> Result<ModulatorMap, EmbeddingError> {
    let mut texts: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for clusters in records.values() {
        for record in clusters.values() {
            for text in [record.claim.as_str(), record.counterclaim.as_str()] {
                if !index.contains_key(text) {
                    index.insert(text, texts.len());
                    texts.push(text);
                }
            }
        }
    }
    let vectors = embed_checked(embedder, &texts)?;
    let slot = |text: &str| index[text];

    let mut modulators = ModulatorMap::new();
    for (user_a, clusters_a) in records {
        let user_entry = modulators.entry(user_a.clone()).or_default();
        for (cluster_a, record_a) in clusters_a {
            let counterclaim = &vectors[slot(&record_a.counterclaim)];
            let mut entries = Vec::new();

            for (user_b, clusters_b) in records {
                if user_a == user_b {
                    continue;
                }
                for (cluster_b, record_b) in clusters_b {
                    let similarity =
                        cosine_similarity(counterclaim, &vectors[slot(&record_b.claim)]) as f64;
                    tracing::debug!(
                        user = %user_a,
                        cluster = cluster_a,
                        other_user = %user_b,
                        other_cluster = cluster_b,
                        similarity,
                        "counterclaim/claim similarity"
                    );
                    if similarity > cutoff {
                        entries.push(ModulatorEntry {
                            value: normalize_similarity(similarity, cutoff),
                            similarity,
                            matched_user: user_b.clone(),
                            matched_cluster: *cluster_b,
                        });
                    }
                }
            }
            user_entry.insert(*cluster_a, entries);
        }
    }
    Ok(modulators)
}
