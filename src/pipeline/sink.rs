//! Event sink and per-session broadcaster
//!
//! The pipeline pushes `GenerationEvent`s into an `EventSink`. Emission is
//! fire-and-forget: a sink never reports failure back into the pipeline.
//!
//! `SessionBroadcaster` fans events out to every observer subscribed to the
//! session. Each observer owns an unbounded channel; an observer whose
//! receiving end is gone is pruned on the next emission without affecting
//! delivery to the others.

use super::events::GenerationEvent;
use crate::session::SessionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receives every event the pipeline broadcasts.
///
/// Called from the generation worker with no session lock held, so an
/// implementation may read the controller (e.g. `snapshot`) but should not
/// block for long: the next stage waits on it.
pub trait EventSink: Send + Sync {
    fn emit(&self, session_id: &SessionId, event: GenerationEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _session_id: &SessionId, _event: GenerationEvent) {}
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Observer {
    id: u64,
    session_id: SessionId,
    receiver: mpsc::UnboundedReceiver<GenerationEvent>,
}

impl Observer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Wait for the next event. `None` once the broadcaster is dropped.
    pub async fn recv(&mut self) -> Option<GenerationEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<GenerationEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<GenerationEvent>,
}

/// Fan-out of generation events to per-session observers.
#[derive(Default)]
pub struct SessionBroadcaster {
    observers: DashMap<SessionId, Mutex<Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a session's events from now on.
    pub fn subscribe(&self, session_id: &SessionId) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.observers
            .entry(session_id.clone())
            .or_default()
            .lock()
            .push(Subscriber { id, sender });
        debug!(session = %session_id, observer = id, "observer subscribed");
        Observer {
            id,
            session_id: session_id.clone(),
            receiver,
        }
    }

    /// Number of observers still attached to a session.
    pub fn observer_count(&self, session_id: &SessionId) -> usize {
        self.observers
            .get(session_id)
            .map(|subs| subs.lock().iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }
}

impl EventSink for SessionBroadcaster {
    fn emit(&self, session_id: &SessionId, event: GenerationEvent) {
        let Some(subscribers) = self.observers.get(session_id) else {
            debug!(session = %session_id, status = event.status(), "no observers");
            return;
        };
        let mut subscribers = subscribers.lock();
        subscribers.retain(|subscriber| match subscriber.sender.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    session = %session_id,
                    observer = subscriber.id,
                    status = event.status(),
                    "observer gone, pruning"
                );
                false
            }
        });
        debug!(
            session = %session_id,
            generation = %event.nonce(),
            status = event.status(),
            receivers = subscribers.len(),
            "event broadcast"
        );
    }
}

/// Sink that records every event, for tests and the CLI.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<(SessionId, GenerationEvent)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(SessionId, GenerationEvent)> {
        self.events.lock().clone()
    }

    /// Events for one session, in emission order.
    pub fn events_for(&self, session_id: &SessionId) -> Vec<GenerationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| s == session_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, session_id: &SessionId, event: GenerationEvent) {
        self.events.lock().push((session_id.clone(), event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GenerationNonce;

    fn failed(reason: &str) -> GenerationEvent {
        GenerationEvent::GenerationFailed {
            nonce: GenerationNonce::new(),
            reason: reason.to_string(),
        }
    }

    #[tokio::test]
    async fn observers_receive_their_session_only() {
        let broadcaster = SessionBroadcaster::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        let mut obs_a = broadcaster.subscribe(&a);
        let mut obs_b = broadcaster.subscribe(&b);

        broadcaster.emit(&a, failed("one"));

        assert!(matches!(obs_a.recv().await, Some(GenerationEvent::GenerationFailed { .. })));
        assert!(obs_b.try_recv().is_none());
    }

    #[test]
    fn dropped_observer_does_not_stop_fan_out() {
        let broadcaster = SessionBroadcaster::new();
        let session = SessionId::from("s");
        let gone = broadcaster.subscribe(&session);
        let mut alive = broadcaster.subscribe(&session);
        drop(gone);

        broadcaster.emit(&session, failed("first"));
        broadcaster.emit(&session, failed("second"));

        assert_eq!(alive.drain().len(), 2);
        assert_eq!(broadcaster.observer_count(&session), 1);
    }

    #[test]
    fn emit_without_observers_is_a_no_op() {
        let broadcaster = SessionBroadcaster::new();
        broadcaster.emit(&SessionId::from("nobody"), failed("x"));
        assert_eq!(broadcaster.observer_count(&SessionId::from("nobody")), 0);
    }

    #[test]
    fn collecting_sink_keeps_order_per_session() {
        let sink = CollectingSink::new();
        let s = SessionId::from("s");
        sink.emit(&s, failed("1"));
        sink.emit(&SessionId::from("other"), failed("x"));
        sink.emit(&s, failed("2"));

        let reasons: Vec<String> = sink
            .events_for(&s)
            .into_iter()
            .map(|e| match e {
                GenerationEvent::GenerationFailed { reason, .. } => reason,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(reasons, vec!["1", "2"]);
        assert_eq!(sink.events().len(), 3);
    }
}
