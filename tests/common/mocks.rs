//! Deterministic collaborators
//!
//! `KeywordEmbedder` gives every keyword its own dimension, so similarities
//! can be worked out by hand. `RoutedCompletionClient` answers an extraction
//! prompt with the reply registered for a sentence it contains.

use agora::collab::{CompletionClient, Embedder, EmbeddingError, LlmError};
use async_trait::async_trait;

const KEYWORDS: [&str; 8] = ["go", "chess", "checkers", "rain", "not", "easy", "deep", "beats"];

pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; KEYWORDS.len()];
                for token in text.split(|c: char| !c.is_alphanumeric()) {
                    let token = token.to_lowercase();
                    if let Some(i) = KEYWORDS.iter().position(|k| *k == token) {
                        v[i] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

/// Completion reply in the shape the LLM extractor expects.
pub fn wepcc_reply(claim: &str, counterclaim: &str, score: f64) -> String {
    serde_json::json!({
        "warrant": format!("{} follows from experience", claim),
        "evidence": "years of play",
        "persuasiveness_justification": {
            "content": {"persuasiveness_score": score, "justification": "plausible"}
        },
        "claim": claim,
        "counterclaim": counterclaim,
    })
    .to_string()
}

#[derive(Default)]
pub struct RoutedCompletionClient {
    routes: Vec<(String, String)>,
}

impl RoutedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer prompts mentioning `sentence` with `reply`.
    pub fn route(mut self, sentence: &str, reply: String) -> Self {
        self.routes.push((sentence.to_string(), reply));
        self
    }
}

#[async_trait]
impl CompletionClient for RoutedCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(self
            .routes
            .iter()
            .find(|(sentence, _)| prompt.contains(sentence.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| "I cannot analyze this.".to_string()))
    }
}
