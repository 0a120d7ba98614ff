//! Common test utilities for agora integration tests
//!
//! Deterministic stand-ins for the embedding model and the LLM, plus a
//! harness that wires them into a running controller.

pub mod mocks;

pub use mocks::{wepcc_reply, KeywordEmbedder, RoutedCompletionClient};

use agora::collab::{
    Collaborators, Embedder, Identity, LlmArgumentExtractor, StaticIdentityResolver,
};
use agora::pipeline::CollectingSink;
use agora::{GenerationController, IncomingMessage, ScoringConfig, SessionId};
use std::sync::Arc;

pub const SESSION: &str = "debate";

/// A controller for one session whose participants log in with `token-<user>`.
pub struct Harness {
    pub controller: Arc<GenerationController>,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    pub fn start(
        users: &[&str],
        embedder: Arc<dyn Embedder>,
        client: RoutedCompletionClient,
        config: ScoringConfig,
    ) -> Self {
        let identity = StaticIdentityResolver::new();
        for user in users {
            identity.issue(format!("token-{}", user), Identity::new(*user, SESSION));
        }
        let collaborators = Collaborators::new(
            Arc::new(identity),
            embedder,
            Arc::new(LlmArgumentExtractor::new(Arc::new(client))),
        );
        let sink = Arc::new(CollectingSink::new());
        let controller = GenerationController::start(collaborators, config, sink.clone())
            .expect("valid config");
        Self { controller, sink }
    }

    pub fn say(&self, user: &str, content: &str) {
        self.controller
            .submit(&format!("token-{}", user), IncomingMessage::new(content))
            .expect("worker running")
            .expect("known user");
    }

    pub async fn settle(&self) {
        self.controller.wait_idle(&SessionId::from(SESSION)).await;
    }
}
