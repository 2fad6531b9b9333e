//! Recorders for replies and bus traffic

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use warden_core::{BusEvent, InvokerReply, ModAction, Responder, Topic};
use warden_moderation::{EventBus, Observer};

/// Collects every reply sent to an invoker
#[derive(Debug, Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<InvokerReply>>,
}

impl RecordingResponder {
    /// Empty recorder
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replies in delivery order
    pub fn replies(&self) -> Vec<InvokerReply> {
        self.replies.lock().clone()
    }

    /// Number of replies delivered
    pub fn count(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn reply(&self, reply: InvokerReply) {
        self.replies.lock().push(reply);
    }
}

/// Bus observer that records everything it sees
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<BusEvent>>,
}

impl EventCollector {
    /// Subscribe a new collector to `topics`
    pub fn attach(bus: &EventBus, topics: &[Topic]) -> Arc<Self> {
        let collector = Arc::new(Self::default());
        for topic in topics {
            bus.subscribe(*topic, collector.clone());
        }
        collector
    }

    /// Every event seen, in publish order
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }

    /// Events seen on `topic`
    pub fn on(&self, topic: Topic) -> Vec<BusEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.topic() == topic)
            .cloned()
            .collect()
    }

    /// Audit records seen
    pub fn mod_actions(&self) -> Vec<ModAction> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BusEvent::ModAction(action) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Observer for EventCollector {
    fn notify(&self, event: &BusEvent) {
        self.events.lock().push(event.clone());
    }
}
