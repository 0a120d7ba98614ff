//! Argument extraction service boundary
//!
//! `ArgumentExtractor` turns a cluster's sentences into a WEPCC record.
//! `LlmArgumentExtractor` is the LLM-backed implementation: it prompts a
//! `CompletionClient` and decodes the JSON reply.
//!
//! Failure kinds matter to the pipeline:
//! - `Unavailable`: the service could not be reached; fatal for the generation
//! - `Malformed`: the reply could not be decoded; that cluster is skipped

use super::llm::{CompletionClient, LlmError};
use crate::pipeline::wepcc::{Persuasiveness, WepccRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Errors from argument extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("argument extraction unavailable: {0}")]
    Unavailable(String),
    #[error("malformed extraction output: {0}")]
    Malformed(String),
}

impl From<LlmError> for ExtractionError {
    fn from(e: LlmError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// The extraction collaborator contract.
#[async_trait]
pub trait ArgumentExtractor: Send + Sync {
    /// Decompose a group of sentences into warrant, evidence, persuasiveness
    /// justification, claim and counterclaim.
    async fn extract(&self, sentences: &[String]) -> Result<WepccRecord, ExtractionError>;
}

/// Extract a JSON object from LLM response text.
///
/// LLMs sometimes wrap JSON in markdown code fences or add explanation text.
/// This function tries, in order:
/// 1. Direct parse (response is pure JSON)
/// 2. Extract from ```json ... ``` or ``` ... ``` fenced block
/// 3. Find the first `{` to last `}` span and parse that
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

/// LLM-backed argument extractor.
pub struct LlmArgumentExtractor {
    client: Arc<dyn CompletionClient>,
}

impl LlmArgumentExtractor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn build_prompt(sentences: &[String]) -> String {
        let mut prompt = String::from(
            "Analyze the following statements from one debate participant as a single argument.\n\
             Respond with one JSON object and nothing else, using these keys:\n\
             \"warrant\", \"evidence\", \"claim\", \"counterclaim\" (strings) and\n\
             \"persuasiveness_justification\": {\"content\": {\"persuasiveness_score\": <number 0-1>, \"justification\": <string>}}\n\n\
             Statements:\n",
        );
        for sentence in sentences {
            prompt.push_str("- ");
            prompt.push_str(sentence);
            prompt.push('\n');
        }
        prompt
    }

    /// Decode a completion reply into a record.
    ///
    /// The justification may be an embedded object or a JSON-encoded string;
    /// either way it is validated into a `Persuasiveness`.
    fn parse_reply(reply: &str) -> Result<WepccRecord, ExtractionError> {
        let object = extract_json(reply)
            .ok_or_else(|| ExtractionError::Malformed("no JSON object in reply".to_string()))?;

        let text_field = |key: &str| -> Result<String, ExtractionError> {
            match object.get(key) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Null) | None => Err(ExtractionError::Malformed(format!(
                    "missing field '{}'",
                    key
                ))),
                Some(other) => Ok(other.to_string()),
            }
        };

        let persuasiveness = match object.get("persuasiveness_justification") {
            Some(Value::String(raw)) => Persuasiveness::parse(raw),
            Some(value) => Persuasiveness::from_value(value, value.to_string()),
            None => Persuasiveness::Malformed {
                raw: String::new(),
                reason: "missing persuasiveness_justification".to_string(),
            },
        };

        Ok(WepccRecord {
            warrant: text_field("warrant")?,
            evidence: text_field("evidence")?,
            persuasiveness,
            claim: text_field("claim")?,
            counterclaim: text_field("counterclaim")?,
        })
    }
}

#[async_trait]
impl ArgumentExtractor for LlmArgumentExtractor {
    async fn extract(&self, sentences: &[String]) -> Result<WepccRecord, ExtractionError> {
        let prompt = Self::build_prompt(sentences);
        let reply = self.client.complete(&prompt).await?;
        Self::parse_reply(&reply)
    }
}
