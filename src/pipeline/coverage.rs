//! Shadow-coverage folding
//!
//! Reduces a cluster's modulator list to one coverage value. The strongest
//! overlap seeds the fold; every further value covers a share of what is
//! still uncovered:
//!
//! ```text
//! coverage = max
//! coverage += v * rescale * (1 - coverage)     for each remaining v
//! ```
//!
//! Since `1 - coverage` shrinks multiplicatively, the fold is independent of
//! the order of the non-maximum values and never exceeds 1.

use super::cross_match::ModulatorMap;
use crate::session::{ClusterId, UserId};
use std::collections::BTreeMap;

/// Shadow coverage per participant and cluster. Only clusters matched by at
/// least one other participant's claim have an entry.
pub type CoverageMap = BTreeMap<UserId, BTreeMap<ClusterId, f64>>;

/// Fold modulator values (each in (0,1]) into a coverage value in [0,1].
///
/// `rescale` weights every value after the first; it is `1 - cutoff` unless
/// configured otherwise. An empty list yields 0.
pub fn fold(values: &[f64], rescale: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let Some((&strongest, rest)) = sorted.split_first() else {
        return 0.0;
    };
    rest.iter()
        .fold(strongest, |coverage, v| coverage + (v * rescale) * (1.0 - coverage))
}

/// Fold every non-empty modulator list.
pub fn shadow_coverage(modulators: &ModulatorMap, rescale: f64) -> CoverageMap {
    let mut coverage = CoverageMap::new();
    for (user_id, clusters) in modulators {
        let folded: BTreeMap<ClusterId, f64> = clusters
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(cluster_id, entries)| {
                let values: Vec<f64> = entries.iter().map(|e| e.value).collect();
                (*cluster_id, fold(&values, rescale))
            })
            .collect();
        for (cluster_id, value) in &folded {
            tracing::debug!(user = %user_id, cluster = cluster_id, coverage = value, "shadow coverage");
        }
        coverage.insert(user_id.clone(), folded);
    }
    coverage
}
