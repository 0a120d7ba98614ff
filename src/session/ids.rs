//! Identifiers shared across the ingest path and the generation pipeline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from a string
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a shared chat session
    SessionId
);

string_id!(
    /// Identifier of a participant within a session
    UserId
);

string_id!(
    /// Identifier of a single inbound chat message
    MessageId
);

impl MessageId {
    /// Roll a fresh random message ID (36 characters).
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Opaque token identifying one generation (one pipeline run).
///
/// A fresh nonce is issued for every inbound message; observers compare the
/// nonce on broadcast events to discard output from superseded generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationNonce(Uuid);

impl GenerationNonce {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GenerationNonce {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GenerationNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant-scoped cluster ordinal.
pub type ClusterId = u32;
