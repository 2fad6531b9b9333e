//! Process-wide publish/subscribe bus
//!
//! Topics are created on first subscribe and dropped when their last observer
//! leaves. Publishing calls every observer of the payload's topic
//! synchronously, in subscription order, exactly once. Nothing is queued or
//! replayed: publishing to a topic nobody observes is a no-op.
//!
//! The observer list is snapshotted before dispatch, so observers may publish
//! or change subscriptions from inside `notify`.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::RwLock` for the topic table because the lock is only
//! held to copy or edit a `Vec` of `Arc`s, never across an observer call or
//! an `.await`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use warden_core::{BusEvent, Topic};

/// Receives events published on the topics it subscribed to
pub trait Observer: Send + Sync {
    /// Handle one published event. Must not block.
    fn notify(&self, event: &BusEvent);
}

impl<F> Observer for F
where
    F: Fn(&BusEvent) + Send + Sync,
{
    fn notify(&self, event: &BusEvent) {
        self(event)
    }
}

/// Errors rejected at the publish boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The payload's schema belongs to a different topic
    #[error("payload for topic '{payload}' published on topic '{topic}'")]
    PayloadMismatch {
        /// Topic named by the publisher
        topic: Topic,
        /// Topic the payload belongs to
        payload: Topic,
    },
}

/// Named-topic dispatcher
#[derive(Default)]
pub struct EventBus {
    topics: RwLock<HashMap<Topic, Vec<Arc<dyn Observer>>>>,
}

fn same_observer(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl EventBus {
    /// Create a bus with no topics
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` on `topic`.
    ///
    /// Returns `false` if this exact observer was already registered there.
    pub fn subscribe(&self, topic: Topic, observer: Arc<dyn Observer>) -> bool {
        let mut topics = self.topics.write();
        let observers = topics.entry(topic).or_default();
        if observers.iter().any(|existing| same_observer(existing, &observer)) {
            return false;
        }
        observers.push(observer);
        trace!(%topic, observers = observers.len(), "Observer subscribed");
        true
    }

    /// Remove `observer` from `topic`, dropping the topic once it is empty.
    ///
    /// Returns `false` if the observer was not registered there.
    pub fn unsubscribe(&self, topic: Topic, observer: &Arc<dyn Observer>) -> bool {
        let mut topics = self.topics.write();
        let Some(observers) = topics.get_mut(&topic) else {
            return false;
        };
        let before = observers.len();
        observers.retain(|existing| !same_observer(existing, observer));
        let removed = observers.len() != before;
        if observers.is_empty() {
            topics.remove(&topic);
        }
        removed
    }

    /// Deliver `event` to every observer of its topic
    pub fn publish(&self, event: BusEvent) {
        let topic = event.topic();
        let observers = match self.topics.read().get(&topic) {
            Some(observers) => observers.clone(),
            None => {
                trace!(%topic, "Publish with no observers");
                return;
            }
        };
        trace!(%topic, observers = observers.len(), "Publishing");
        for observer in observers {
            observer.notify(&event);
        }
    }

    /// Publish on an explicitly named topic, rejecting a mismatched payload
    pub fn publish_to(&self, topic: Topic, event: BusEvent) -> Result<(), BusError> {
        let payload = event.topic();
        if payload != topic {
            return Err(BusError::PayloadMismatch { topic, payload });
        }
        self.publish(event);
        Ok(())
    }

    /// Whether any observer is registered on `topic`
    pub fn has_topic(&self, topic: Topic) -> bool {
        self.topics.read().contains_key(&topic)
    }

    /// Number of observers registered on `topic`
    pub fn observer_count(&self, topic: Topic) -> usize {
        self.topics.read().get(&topic).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.read();
        let mut counts: Vec<(Topic, usize)> = topics.iter().map(|(t, o)| (*t, o.len())).collect();
        counts.sort();
        f.debug_struct("EventBus").field("topics", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use warden_core::{CommunityId, PunishmentKind, UserId};

    fn unban() -> BusEvent {
        BusEvent::unpunish(PunishmentKind::Ban, UserId::new(1), CommunityId::new(2))
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn Observer> {
        let log = log.clone();
        Arc::new(move |_: &BusEvent| log.lock().push(name))
    }

    #[test]
    fn test_topics_are_created_and_dropped_lazily() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let observer = recorder(&log, "a");

        assert!(!bus.has_topic(Topic::Unban));
        bus.subscribe(Topic::Unban, observer.clone());
        assert!(bus.has_topic(Topic::Unban));

        assert!(bus.unsubscribe(Topic::Unban, &observer));
        assert!(!bus.has_topic(Topic::Unban));
        assert!(!bus.unsubscribe(Topic::Unban, &observer));
    }

    #[test]
    fn test_subscribe_is_idempotent_and_ordered() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");

        assert!(bus.subscribe(Topic::Unban, first.clone()));
        assert!(bus.subscribe(Topic::Unban, second));
        assert!(!bus.subscribe(Topic::Unban, first));
        assert_eq!(bus.observer_count(Topic::Unban), 2);

        bus.publish(unban());
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_publish_without_observers_is_silent() {
        let bus = EventBus::new();
        bus.publish(unban());
        assert!(!bus.has_topic(Topic::Unban));
    }

    #[test]
    fn test_publish_to_rejects_foreign_payload() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::Unmute, recorder(&log, "unmute"));

        let err = bus.publish_to(Topic::Unmute, unban()).unwrap_err();
        assert_eq!(
            err,
            BusError::PayloadMismatch {
                topic: Topic::Unmute,
                payload: Topic::Unban
            }
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_observer_may_publish_and_unsubscribe_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::Unmute, recorder(&log, "unmute"));

        let slot: Arc<Mutex<Option<Arc<dyn Observer>>>> = Arc::new(Mutex::new(None));
        let relay: Arc<dyn Observer> = {
            let bus = bus.clone();
            let slot = slot.clone();
            Arc::new(move |_: &BusEvent| {
                bus.publish(BusEvent::unpunish(
                    PunishmentKind::Mute,
                    UserId::new(1),
                    CommunityId::new(2),
                ));
                if let Some(me) = slot.lock().take() {
                    bus.unsubscribe(Topic::Unban, &me);
                }
            })
        };
        *slot.lock() = Some(relay.clone());
        bus.subscribe(Topic::Unban, relay);

        bus.publish(unban());
        bus.publish(unban());

        assert_eq!(*log.lock(), vec!["unmute"]);
        assert!(!bus.has_topic(Topic::Unban));
    }
}
