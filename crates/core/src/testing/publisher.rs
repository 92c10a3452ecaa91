use std::sync::Mutex;

use serde_json::Value;

use crate::events::EventPublisher;

/// An event captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

/// Publisher that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_named(&self, event: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }

    pub fn events_on(&self, topic: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.topic == topic)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, event: &str, payload: Value) {
        self.events.lock().unwrap().push(RecordedEvent {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        });
    }
}
