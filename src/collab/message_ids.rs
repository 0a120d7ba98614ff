//! Durable message-id store boundary
//!
//! Message IDs are rolled randomly; the store is consulted so a new ID never
//! collides with one already persisted.

use crate::session::MessageId;
use dashmap::DashSet;

/// Store of message IDs already in use.
pub trait MessageIdStore: Send + Sync {
    fn contains(&self, id: &MessageId) -> bool;
    fn record(&self, id: &MessageId);
}

/// Process-local store. Forgets everything on restart.
#[derive(Debug, Default)]
pub struct InMemoryMessageIdStore {
    ids: DashSet<MessageId>,
}

impl InMemoryMessageIdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl MessageIdStore for InMemoryMessageIdStore {
    fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    fn record(&self, id: &MessageId) {
        self.ids.insert(id.clone());
    }
}

/// Roll message IDs until one is not in the store, then record it.
pub fn allocate_message_id(
    store: &dyn MessageIdStore,
    mut roll: impl FnMut() -> MessageId,
) -> MessageId {
    let mut id = roll();
    while store.contains(&id) {
        tracing::debug!(message_id = %id, "message id collision, re-rolling");
        id = roll();
    }
    store.record(&id);
    id
}
