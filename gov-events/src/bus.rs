// gov-events/src/bus.rs
// ============================================================================
// Module: Event Bus
// Description: In-process publish/subscribe over typed governance events.
// Purpose: Fan out committed-state notifications to subscribers (alert
//          rules, an SSE transport, tests) without blocking the publisher.
// Dependencies: crate::scrub, serde_json, std::sync::mpsc
// ============================================================================

//! ## Overview
//! [`EventBus`] is a plain in-process pub/sub: [`EventBus::publish`] scrubs
//! the payload (see [`crate::scrub`]) and fans it out to every subscriber
//! whose topic filter matches. Subscribers receive events on a bounded
//! `std::sync::mpsc` queue; a subscriber that falls behind has events
//! dropped rather than blocking the publisher, per the "subscribers must not
//! block" requirement. A disconnected subscriber (receiver dropped) is
//! pruned lazily on the next publish.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::sync::mpsc::sync_channel;

use serde_json::Value;

use crate::scrub::scrub_value;
use crate::time::now_iso8601_ms;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound on a subscriber's event queue.
pub const DEFAULT_SUBSCRIBER_QUEUE_LEN: usize = 256;

// ============================================================================
// SECTION: Topics
// ============================================================================

/// The fixed set of typed events the core publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// A worker process reported `online` or `offline`.
    WorkerStatus,
    /// A dispatch attempt changed lifecycle state (queued/sent/failed/ok).
    DispatchLifecycle,
    /// A circuit breaker opened or closed.
    BreakerState,
    /// A notification row was inserted.
    NotificationCreated,
    /// A chat message was posted to a topic.
    ChatMessage,
}

impl EventTopic {
    /// Returns the wire name used in published event envelopes.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::WorkerStatus => "worker:status",
            Self::DispatchLifecycle => "dispatch:lifecycle",
            Self::BreakerState => "breaker:state",
            Self::NotificationCreated => "notification:created",
            Self::ChatMessage => "chat:message",
        }
    }
}

// ============================================================================
// SECTION: Event Envelope
// ============================================================================

/// One published event, after scrubbing.
#[derive(Debug, Clone)]
pub struct Event {
    /// Which topic this event belongs to.
    pub topic: EventTopic,
    /// Scrubbed JSON payload.
    pub payload: Value,
    /// UTC ISO-8601 millisecond publish timestamp.
    pub published_at: String,
}

// ============================================================================
// SECTION: Subscriptions
// ============================================================================

struct Subscriber {
    topics: Option<Vec<EventTopic>>,
    sender: SyncSender<Event>,
}

impl Subscriber {
    fn wants(&self, topic: EventTopic) -> bool {
        self.topics.as_ref().is_none_or(|topics| topics.contains(&topic))
    }
}

/// A live subscription handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    receiver: Receiver<Event>,
}

impl Subscription {
    /// Blocks until the next event arrives, or returns `None` once the bus
    /// itself has been dropped.
    #[must_use]
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Returns the next already-queued event without blocking, or `None` if
    /// the queue is currently empty.
    #[must_use]
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// In-process publish/subscribe bus for governance events.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    queue_len: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus whose subscriber queues hold
    /// [`DEFAULT_SUBSCRIBER_QUEUE_LEN`] events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_len(DEFAULT_SUBSCRIBER_QUEUE_LEN)
    }

    /// Creates a bus with a custom per-subscriber queue bound.
    #[must_use]
    pub fn with_queue_len(queue_len: usize) -> Self {
        Self { subscribers: Mutex::new(Vec::new()), queue_len }
    }

    /// Subscribes to every topic the bus carries.
    #[expect(clippy::missing_panics_doc, reason = "lock is only ever held briefly and never panics under normal use")]
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(None)
    }

    /// Subscribes to a fixed set of topics.
    pub fn subscribe_to(&self, topics: Vec<EventTopic>) -> Subscription {
        self.subscribe(Some(topics))
    }

    fn subscribe(&self, topics: Option<Vec<EventTopic>>) -> Subscription {
        let (sender, receiver) = sync_channel(self.queue_len);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.push(Subscriber { topics, sender });
        Subscription { receiver }
    }

    /// Scrubs `payload` and publishes it to every matching, still-connected
    /// subscriber. Subscribers whose queue is full simply miss this event;
    /// subscribers whose receiver has been dropped are pruned.
    pub fn publish(&self, topic: EventTopic, payload: &Value) {
        let scrubbed = scrub_value(payload);
        let event = Event { topic, payload: scrubbed, published_at: now_iso8601_ms() };
        let mut subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.retain(|subscriber| {
            if !subscriber.wants(topic) {
                return true;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    /// Returns the number of currently connected subscribers, for tests and
    /// diagnostics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_receives_matching_topic_only() {
        let bus = EventBus::new();
        let sub = bus.subscribe_to(vec![EventTopic::WorkerStatus]);
        bus.publish(EventTopic::BreakerState, &serde_json::json!({"open": true}));
        bus.publish(EventTopic::WorkerStatus, &serde_json::json!({"workerId": "w-1"}));
        let event = sub.try_recv().expect("one event");
        assert_eq!(event.topic.wire_name(), "worker:status");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn publish_scrubs_payload_before_delivery() {
        let bus = EventBus::new();
        let sub = bus.subscribe_all();
        bus.publish(EventTopic::DispatchLifecycle, &serde_json::json!({"apiSecret": "s3cr3t"}));
        let event = sub.try_recv().expect("event delivered");
        assert_eq!(event.payload["apiSecret"], "[redacted]");
    }

    #[test]
    fn full_queue_drops_event_without_blocking_publisher() {
        let bus = EventBus::with_queue_len(1);
        let sub = bus.subscribe_all();
        bus.publish(EventTopic::ChatMessage, &serde_json::json!({"n": 1}));
        bus.publish(EventTopic::ChatMessage, &serde_json::json!({"n": 2}));
        let first = sub.try_recv().expect("first event kept");
        assert_eq!(first.payload["n"], 1);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe_all();
            assert_eq!(bus.subscriber_count(), 1);
        }
        bus.publish(EventTopic::NotificationCreated, &serde_json::json!({}));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
