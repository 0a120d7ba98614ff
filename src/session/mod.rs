//! Session-scoped state: identifiers, message history and committed results

mod ids;
mod state;
mod store;

pub use ids::{ClusterId, GenerationNonce, MessageId, SessionId, UserId};
pub use state::{
    ChatMessage, GenerationLogEntry, GenerationOutcome, SessionSnapshot, SessionState, SessionStatus,
};
pub use store::{SessionStore, SharedSession};
