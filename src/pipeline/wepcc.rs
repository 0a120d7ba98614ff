//! Argument records (Warrant / Evidence / Persuasiveness / Claim / Counterclaim)
//!
//! One record per distinct cluster fingerprint. The persuasiveness
//! justification arrives from the extraction collaborator as free-form JSON;
//! it is validated here, once, so downstream stages only see a typed score or
//! an explicit `Malformed` marker.

use super::cluster::Clustering;
use crate::session::{ClusterId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Validated persuasiveness justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Persuasiveness {
    /// A numeric `persuasiveness_score` was found.
    Scored {
        score: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        justification: Option<String>,
        raw: String,
    },
    /// The justification could not be read; the cluster is excluded from scoring.
    Malformed { raw: String, reason: String },
}

impl Persuasiveness {
    /// Validate a raw justification string.
    ///
    /// Accepts a JSON object carrying `persuasiveness_score` either at the top
    /// level or nested under `content`. The score may be a number or a
    /// numeric string.
    pub fn parse(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(v) => v,
            Err(e) => {
                return Self::Malformed {
                    raw: raw.to_string(),
                    reason: format!("not JSON: {}", e),
                }
            }
        };
        Self::from_value(&value, raw.to_string())
    }

    /// Validate an already-decoded justification object.
    pub fn from_value(value: &Value, raw: String) -> Self {
        let body = match value.get("content") {
            Some(content) if content.is_object() => content,
            _ => value,
        };
        if !body.is_object() {
            return Self::Malformed {
                raw,
                reason: "justification is not an object".to_string(),
            };
        }
        let score = match body.get("persuasiveness_score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match score {
            Some(score) if score.is_finite() => Self::Scored {
                score,
                justification: body
                    .get("justification")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw,
            },
            _ => Self::Malformed {
                raw,
                reason: "missing or non-numeric persuasiveness_score".to_string(),
            },
        }
    }

    /// The numeric score, if the justification was well formed.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored { score, .. } => Some(*score),
            Self::Malformed { .. } => None,
        }
    }
}

/// Structured argument decomposition of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WepccRecord {
    pub warrant: String,
    pub evidence: String,
    pub persuasiveness: Persuasiveness,
    pub claim: String,
    pub counterclaim: String,
}

/// Argument records for the clusters of the current generation.
pub type RecordSet = BTreeMap<UserId, BTreeMap<ClusterId, WepccRecord>>;

/// Records keyed by cluster fingerprint.
pub type RecordCache = HashMap<String, WepccRecord>;

/// Look up the record of every cluster in `clustering`.
///
/// Clusters without a cached record are left out; participants with none
/// are omitted.
pub fn collect_records(clustering: &Clustering, cache: &RecordCache) -> RecordSet {
    let mut records = RecordSet::new();
    for (user_id, clusters) in clustering {
        let found: BTreeMap<ClusterId, WepccRecord> = clusters
            .iter()
            .filter_map(|(id, cluster)| cache.get(&cluster.cluster_hash).map(|r| (*id, r.clone())))
            .collect();
        if !found.is_empty() {
            records.insert(user_id.clone(), found);
        }
    }
    records
}
