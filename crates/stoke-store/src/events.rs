//! Realtime events and the subscription fan-out hub.
//!
//! The store delivers change notifications on per-collection channels named
//! `databases.<db>.collections.<coll>.documents`. Each notification carries
//! a list of event strings in the form
//! `databases.<db>.collections.<coll>.documents.<id>.<kind>` together with
//! wildcard-qualified variants (`databases.*.collections.*.documents.*.<kind>`),
//! so consumers can classify by suffix without parsing ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The three document change kinds carried in event strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ChangeKind::Create => ".create",
            ChangeKind::Update => ".update",
            ChangeKind::Delete => ".delete",
        }
    }

    /// Classify a single event string by suffix. Collection-agnostic:
    /// wildcard-qualified and fully-qualified forms classify the same way.
    pub fn classify(event: &str) -> Option<ChangeKind> {
        for kind in [ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete] {
            if event.ends_with(kind.suffix()) {
                return Some(kind);
            }
        }
        None
    }
}

/// A change notification delivered on a realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Channel the event was delivered on
    pub channel: String,
    /// Event strings describing the change (concrete + wildcard forms)
    pub events: Vec<String>,
    /// The document payload after the change (empty object for deletes)
    #[serde(default)]
    pub payload: Value,
}

impl RealtimeEvent {
    /// Whether any event string carries the given change kind.
    pub fn includes(&self, kind: ChangeKind) -> bool {
        self.events.iter().any(|e| e.ends_with(kind.suffix()))
    }
}

/// Channel name for a collection's document events.
pub fn documents_channel(database_id: &str, collection_id: &str) -> String {
    format!("databases.{database_id}.collections.{collection_id}.documents")
}

/// Event strings for one document change: the fully-qualified form plus the
/// wildcard-qualified form matched by suffix classifiers.
pub fn document_events(
    database_id: &str,
    collection_id: &str,
    document_id: &str,
    kind: ChangeKind,
) -> Vec<String> {
    let kind = kind.as_str();
    vec![
        format!("databases.{database_id}.collections.{collection_id}.documents.{document_id}.{kind}"),
        format!("databases.*.collections.*.documents.*.{kind}"),
    ]
}

/// A live subscription to one realtime channel.
///
/// Dropping the subscription unsubscribes from the hub exactly once.
pub struct Subscription {
    receiver: mpsc::Receiver<RealtimeEvent>,
    _guard: SubscriptionGuard,
}

impl Subscription {
    /// Receive the next event. Returns `None` once the hub is gone and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.recv().await
    }
}

struct SubscriptionGuard {
    hub: Weak<RealtimeHub>,
    channel: String,
    id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(&self.channel, self.id);
        }
    }
}

/// Fan-out registry for realtime subscribers, indexed by channel.
///
/// Shared by every store implementation: the HTTP store feeds it from the
/// realtime socket, the in-memory store feeds it from its own mutations.
pub(crate) struct RealtimeHub {
    subscribers: DashMap<String, Vec<(u64, mpsc::Sender<RealtimeEvent>)>>,
    next_id: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(0),
        })
    }

    /// Register a subscriber for a channel.
    pub fn subscribe(self: &Arc<Self>, channel: &str, buffer: usize) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.subscribers
            .entry(channel.to_string())
            .or_default()
            .push((id, tx));
        debug!(channel, id, "realtime subscriber added");
        Subscription {
            receiver: rx,
            _guard: SubscriptionGuard {
                hub: Arc::downgrade(self),
                channel: channel.to_string(),
                id,
            },
        }
    }

    /// Deliver an event to every subscriber of its channel.
    ///
    /// Delivery never blocks the publisher; a subscriber whose buffer is
    /// full misses the event and catches up on the next one.
    pub fn publish(&self, event: RealtimeEvent) {
        let Some(subs) = self.subscribers.get(&event.channel) else {
            return;
        };
        for (id, tx) in subs.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event.clone()) {
                warn!(channel = %event.channel, id, "subscriber buffer full, dropping event");
            }
        }
    }

    fn unsubscribe(&self, channel: &str, id: u64) {
        if let Some(mut subs) = self.subscribers.get_mut(channel) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            debug!(channel, id, "realtime subscriber removed");
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers.get(channel).map_or(0, |subs| subs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(channel: &str, kind: ChangeKind) -> RealtimeEvent {
        RealtimeEvent {
            channel: channel.to_string(),
            events: document_events("main", "habits", "h-1", kind),
            payload: json!({}),
        }
    }

    #[test]
    fn test_classify_by_suffix() {
        assert_eq!(
            ChangeKind::classify("databases.*.collections.*.documents.*.create"),
            Some(ChangeKind::Create)
        );
        assert_eq!(
            ChangeKind::classify("databases.main.collections.habits.documents.h-1.update"),
            Some(ChangeKind::Update)
        );
        assert_eq!(
            ChangeKind::classify("databases.main.collections.habits.documents.h-1.delete"),
            Some(ChangeKind::Delete)
        );
        assert_eq!(
            ChangeKind::classify("databases.main.collections.habits.documents"),
            None
        );
    }

    #[test]
    fn test_event_includes() {
        let e = event("c", ChangeKind::Create);
        assert!(e.includes(ChangeKind::Create));
        assert!(!e.includes(ChangeKind::Delete));
    }

    #[tokio::test]
    async fn test_hub_delivers_to_channel_subscribers() {
        let hub = RealtimeHub::new();
        let mut sub = hub.subscribe("habits", 8);
        let mut other = hub.subscribe("completions", 8);

        hub.publish(event("habits", ChangeKind::Create));

        let received = sub.recv().await.expect("event delivered");
        assert!(received.includes(ChangeKind::Create));

        // The other channel saw nothing.
        assert!(tokio::time::timeout(
            std::time::Duration::from_millis(20),
            other.recv()
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes_once() {
        let hub = RealtimeHub::new();
        let sub = hub.subscribe("habits", 8);
        let sub2 = hub.subscribe("habits", 8);
        assert_eq!(hub.subscriber_count("habits"), 2);

        drop(sub);
        assert_eq!(hub.subscriber_count("habits"), 1);
        drop(sub2);
        assert_eq!(hub.subscriber_count("habits"), 0);
    }
}
