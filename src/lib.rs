//! Agora: incremental argumentation scoreboard
//!
//! Scores participants of a shared chat session by how well their arguments
//! hold up against everyone else's. Every new message triggers a generation:
//! the session's messages are clustered per participant, each changed
//! cluster is decomposed into warrant, evidence, persuasiveness, claim and
//! counterclaim, counterclaims are matched against other participants'
//! claims, and the resulting coverage discounts each argument's
//! persuasiveness. Arguments nobody engaged are weighted up.
//!
//! A newer message cancels the in-flight generation of its session, so only
//! the latest generation ever commits.
//!
//! # Example
//!
//! ```no_run
//! use agora::collab::{Collaborators, Identity, StaticIdentityResolver, TokenHashEmbedder};
//! use agora::collab::{LlmArgumentExtractor, MockCompletionClient};
//! use agora::{GenerationController, IncomingMessage, NullSink, ScoringConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = StaticIdentityResolver::new().with_token("t-alice", Identity::new("alice", "s1"));
//! let llm = Arc::new(MockCompletionClient::always("{}"));
//! let collaborators = Collaborators::new(
//!     Arc::new(identity),
//!     Arc::new(TokenHashEmbedder::default()),
//!     Arc::new(LlmArgumentExtractor::new(llm)),
//! );
//! let controller = GenerationController::start(collaborators, ScoringConfig::default(), Arc::new(NullSink))?;
//! controller.submit("t-alice", IncomingMessage::new("Go is the hardest board game"))?;
//! # Ok(())
//! # }
//! ```

pub mod collab;
pub mod config;
pub mod pipeline;
pub mod session;

pub use config::{ConfigError, ScoringConfig};
pub use pipeline::{
    ControllerError, GenerationController, GenerationEvent, GenerationHandle, IncomingMessage,
    NullSink, Observer, PipelineError, Scoreboard, ScoringOutcome,
};
pub use session::{GenerationNonce, MessageId, SessionId, SessionSnapshot, SessionStatus, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
