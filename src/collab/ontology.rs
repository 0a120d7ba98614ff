//! Ontology extraction boundary
//!
//! Each inbound message may be run through an ontology extractor whose output
//! (a display string, e.g. a mermaid graph) is kept on the session for UI
//! purposes. It never feeds into scoring.

use crate::session::{MessageId, SessionId, UserId};

/// Errors from ontology extraction.
#[derive(Debug, thiserror::Error)]
#[error("ontology extraction failed: {0}")]
pub struct OntologyError(pub String);

/// Turns one message into a displayable ontology.
pub trait OntologyExtractor: Send + Sync {
    fn extract(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        message_id: &MessageId,
        message: &str,
    ) -> Result<String, OntologyError>;
}

/// Minimal extractor: a mermaid graph linking the message to its author and session.
#[derive(Debug, Default, Clone)]
pub struct MermaidOutlineExtractor;

impl OntologyExtractor for MermaidOutlineExtractor {
    fn extract(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        message_id: &MessageId,
        message: &str,
    ) -> Result<String, OntologyError> {
        let label = message.replace('"', "'");
        Ok(format!(
            "graph LR\n    {user}[\"{user} (USER)\"]\n    {session}[\"{session} (SESSION)\"]\n    \
             msg_{mid}[\"{label}\"]\n    msg_{mid} --> {user}\n    msg_{mid} --> {session}\n",
            user = user_id,
            session = session_id,
            mid = message_id.as_str().replace('-', "_"),
            label = label,
        ))
    }
}
