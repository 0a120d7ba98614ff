//! Incremental diff: which clusters changed since the last committed generation
//!
//! Argument extraction is the expensive stage, so only clusters whose content
//! differs from the previous clustering are pushed into it.

use super::cluster::Clustering;
use std::collections::BTreeMap;

/// Clusters of `current` that are new or whose fingerprint changed.
///
/// A participant absent from `previous` has every cluster changed. Otherwise a
/// cluster is changed iff `previous` has no cluster with the same id and the
/// same fingerprint. Participants with nothing changed are omitted.
pub fn diff(current: &Clustering, previous: &Clustering) -> Clustering {
    let mut changed = Clustering::new();
    for (user_id, clusters) in current {
        let Some(prior) = previous.get(user_id) else {
            changed.insert(user_id.clone(), clusters.clone());
            continue;
        };

        let user_changed: BTreeMap<_, _> = clusters
            .iter()
            .filter(|(id, cluster)| {
                prior
                    .get(*id)
                    .map_or(true, |p| p.cluster_hash != cluster.cluster_hash)
            })
            .map(|(id, cluster)| (*id, cluster.clone()))
            .collect();

        if !user_changed.is_empty() {
            changed.insert(user_id.clone(), user_changed);
        }
    }
    changed
}

/// Total number of clusters across all participants.
pub fn cluster_count(clustering: &Clustering) -> usize {
    clustering.values().map(|c| c.len()).sum()
}
