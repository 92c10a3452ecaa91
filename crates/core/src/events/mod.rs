//! Post-commit event publication.
//!
//! Publication is fire-and-forget and at-most-once. Callers publish only
//! after their transaction committed; a failed or dropped publish never
//! affects stored state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

pub const TICKET_CREATED: &str = "ticket.created";
pub const TICKET_DISPATCHED: &str = "ticket.dispatched";
pub const TICKET_HANDED_OFF: &str = "ticket.handed_off";
pub const TICKET_COMPLETED: &str = "ticket.completed";
pub const TICKET_CANCELLED: &str = "ticket.cancelled";
pub const TICKET_TRANSFERRED: &str = "ticket.transferred";
pub const TICKET_RESERVED: &str = "ticket.reserved";
pub const QUEUE_ADVANCE: &str = "queue.advance";
pub const CASHIER_PAUSED: &str = "cashier.paused";
pub const CASHIER_OUT_OF_SERVICE: &str = "cashier.out_of_service";
pub const CASHIER_RESUMED: &str = "cashier.resumed";

pub fn service_topic(service_id: i64) -> String {
    format!("service.{}", service_id)
}

pub fn cashier_topic(cashier_id: i64) -> String {
    format!("cashier.{}", cashier_id)
}

/// Envelope delivered to subscribers. `id` lets consumers drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub id: Uuid,
    pub topic: String,
    pub event: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(topic: &str, event: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// Sink for queue events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, event: &str, payload: Value);
}

/// Publisher that drops everything.
#[derive(Debug, Default, Clone)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, topic: &str, event: &str, _payload: Value) {
        debug!(topic, event, "Dropping event (no publisher configured)");
    }
}

/// Fan-out publisher backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<QueueEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, topic: &str, event: &str, payload: Value) {
        let envelope = QueueEvent::new(topic, event, payload);
        debug!(topic, event, event_id = %envelope.id, "Publishing queue event");
        // Send only fails when nobody is subscribed.
        let _ = self.sender.send(envelope);
    }
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, topic: &str, event: &str, payload: Value) {
        (**self).publish(topic, event, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topics() {
        assert_eq!(service_topic(3), "service.3");
        assert_eq!(cashier_topic(7), "cashier.7");
    }

    #[tokio::test]
    async fn test_broadcast_publisher_delivers_to_subscribers() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish("service.1", TICKET_CREATED, json!({ "ticket_id": 1 }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "service.1");
        assert_eq!(event.event, TICKET_CREATED);
        assert_eq!(event.payload["ticket_id"], 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::new(4);
        publisher.publish("cashier.1", CASHIER_PAUSED, Value::Null);
    }

    #[test]
    fn test_envelopes_get_distinct_ids() {
        let a = QueueEvent::new("service.1", QUEUE_ADVANCE, Value::Null);
        let b = QueueEvent::new("service.1", QUEUE_ADVANCE, Value::Null);
        assert_ne!(a.id, b.id);
    }
}
