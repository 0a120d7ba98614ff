//! Cluster engine: per-participant grouping of related statements
//!
//! Each participant's messages are clustered independently: embed, normalize,
//! then average-linkage agglomerative merging while the closest pair of groups
//! is nearer than the distance threshold. Every cluster is fingerprinted so
//! identical content is recognised across generations.

use crate::collab::embedding::{embed_checked, Embedder, EmbeddingError};
use crate::session::{ClusterId, GenerationNonce, SessionId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A fingerprinted group of one participant's sentences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: ClusterId,
    pub sentences: Vec<String>,
    pub cluster_hash: String,
    pub user_id: UserId,
    pub session_id: SessionId,
    /// Generation that produced this cluster
    pub generation: GenerationNonce,
}

impl Cluster {
    pub fn new(
        cluster_id: ClusterId,
        sentences: Vec<String>,
        user_id: UserId,
        session_id: SessionId,
        generation: GenerationNonce,
    ) -> Self {
        let cluster_hash = fingerprint(&sentences);
        Self {
            cluster_id,
            sentences,
            cluster_hash,
            user_id,
            session_id,
            generation,
        }
    }
}

/// Per-participant clusters, keyed by cluster id.
pub type Clustering = BTreeMap<UserId, BTreeMap<ClusterId, Cluster>>;

/// SHA-256 (hex) of the JSON encoding of the sorted sentence list.
///
/// Independent of arrival order; duplicates count.
pub fn fingerprint(sentences: &[String]) -> String {
    let mut sorted: Vec<&str> = sentences.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let encoded = serde_json::to_string(&sorted).unwrap_or_default();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

/// Groups each participant's messages into clusters.
pub struct ClusterEngine<'a> {
    embedder: &'a dyn Embedder,
    distance_threshold: f64,
}

impl<'a> ClusterEngine<'a> {
    pub fn new(embedder: &'a dyn Embedder, distance_threshold: f64) -> Self {
        Self {
            embedder,
            distance_threshold,
        }
    }

    /// Cluster every participant with at least two messages.
    pub fn cluster(
        &self,
        messages: &BTreeMap<UserId, Vec<String>>,
        session_id: &SessionId,
        generation: GenerationNonce,
    ) -> Result<Clustering, EmbeddingError> {
        let mut clustering = Clustering::new();
        for (user_id, user_messages) in messages {
            if user_messages.len() < 2 {
                continue;
            }
            let texts: Vec<&str> = user_messages.iter().map(String::as_str).collect();
            let vectors = embed_checked(self.embedder, &texts)?;
            let groups = group_by_distance(&vectors, self.distance_threshold);

            let clusters = groups
                .into_iter()
                .enumerate()
                .map(|(ordinal, members)| {
                    let sentences = members.iter().map(|&i| user_messages[i].clone()).collect();
                    let id = ordinal as ClusterId;
                    (
                        id,
                        Cluster::new(id, sentences, user_id.clone(), session_id.clone(), generation),
                    )
                })
                .collect();
            clustering.insert(user_id.clone(), clusters);
        }
        Ok(clustering)
    }
}

fn normalize(v: &[f32]) -> Vec<f64> {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return v.iter().map(|x| *x as f64).collect();
    }
    v.iter().map(|x| *x as f64 / norm).collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Average-linkage agglomerative grouping over normalized vectors.
///
/// Returns groups of input indices. Members keep input order and groups are
/// ordered by their earliest member, so ids stay put while older messages
/// keep clustering the same way.
fn group_by_distance(vectors: &[Vec<f32>], threshold: f64) -> Vec<Vec<usize>> {
    let points: Vec<Vec<f64>> = vectors.iter().map(|v| normalize(v)).collect();
    let n = points.len();
    let mut distances = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&points[i], &points[j]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for a in 0..groups.len() {
            for b in (a + 1)..groups.len() {
                let mut total = 0.0;
                for &i in &groups[a] {
                    for &j in &groups[b] {
                        total += distances[i][j];
                    }
                }
                let avg = total / (groups[a].len() * groups[b].len()) as f64;
                if best.map_or(true, |(_, _, d)| avg < d) {
                    best = Some((a, b, avg));
                }
            }
        }
        match best {
            Some((a, b, d)) if d < threshold => {
                let merged = groups.remove(b);
                groups[a].extend(merged);
                groups[a].sort_unstable();
            }
            _ => break,
        }
    }

    groups.sort_by_key(|g| g[0]);
    groups
}
