//! External collaborators
//!
//! Black-box services the pipeline calls through fixed contracts: embedding,
//! argument extraction (LLM-backed), identity resolution, message-id
//! deduplication and display-only ontology extraction.

pub mod embedding;
pub mod extraction;
pub mod identity;
pub mod llm;
pub mod message_ids;
pub mod ontology;

use std::sync::Arc;

pub use embedding::{cosine_similarity, Embedder, EmbeddingError, TokenHashEmbedder};
#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use extraction::{ArgumentExtractor, ExtractionError, LlmArgumentExtractor};
pub use identity::{Identity, IdentityResolver, StaticIdentityResolver};
pub use llm::{CommandCompletionClient, CompletionClient, LlmError, MockCompletionClient};
pub use message_ids::{InMemoryMessageIdStore, MessageIdStore};
pub use ontology::{MermaidOutlineExtractor, OntologyError, OntologyExtractor};

/// The full set of collaborators a controller is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub message_ids: Arc<dyn MessageIdStore>,
    pub embedder: Arc<dyn Embedder>,
    pub extractor: Arc<dyn ArgumentExtractor>,
    pub ontology: Option<Arc<dyn OntologyExtractor>>,
}

impl Collaborators {
    /// Wire the required collaborators with an in-memory message-id store and
    /// no ontology extractor.
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn ArgumentExtractor>,
    ) -> Self {
        Self {
            identity,
            message_ids: Arc::new(InMemoryMessageIdStore::new()),
            embedder,
            extractor,
            ontology: None,
        }
    }

    pub fn with_message_ids(mut self, store: Arc<dyn MessageIdStore>) -> Self {
        self.message_ids = store;
        self
    }

    pub fn with_ontology(mut self, ontology: Arc<dyn OntologyExtractor>) -> Self {
        self.ontology = Some(ontology);
        self
    }
}
