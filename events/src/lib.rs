//! Event system infrastructure for the shiftboard platform.
//!
//! This crate provides the event model that enables loose coupling between
//! domain logic (shift, coverage and event-lock services) and the real-time
//! delivery infrastructure in the `sse` crate.
//!
//! # Architecture
//!
//! - **Event**: a typed, optionally scoped notification carrying an arbitrary
//!   serializable payload
//! - **event_type**: the recognized event type names
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, so both the domain layer
//! and the delivery layer can depend on it without cycles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Name of the shared bus channel every broker instance publishes to and
/// listens on. All processes in a deployment must agree on it; instances on
/// different channels never see each other's events.
pub const DEFAULT_BUS_CHANNEL: &str = "shiftboard:events";

/// Default number of undelivered messages a subscriber may have queued before
/// new messages for it are dropped.
pub const DEFAULT_CLIENT_CAPACITY: usize = 64;

/// Recognized event type names. The delivery layer treats them as opaque
/// strings; new types can be added without touching the broker.
pub mod event_type {
    pub const SHIFT_CREATED: &str = "shift.created";
    pub const SHIFT_UPDATED: &str = "shift.updated";
    pub const SHIFT_DELETED: &str = "shift.deleted";
    pub const EVENT_LOCK_CHANGED: &str = "event.lock_changed";
    pub const COVERAGE_UPDATED: &str = "coverage.updated";
}

/// A state-change notification emitted by a domain service.
///
/// `scope` is the top-level resource identifier the event belongs to (for
/// example an event or team id). An empty scope means the event is global and
/// only reaches subscribers that listen to everything.
///
/// Payloads default to `serde_json::Value` so that events can cross crate
/// boundaries without the delivery layer knowing any entity types, but any
/// `Serialize` type works for publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P = Value> {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
}

impl<P> Event<P> {
    /// Create an event scoped to a single top-level resource.
    pub fn new(event_type: impl Into<String>, scope: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            scope: scope.into(),
            payload: Some(payload),
        }
    }

    /// Create an event that every global subscriber receives.
    pub fn global(event_type: impl Into<String>, payload: P) -> Self {
        Self::new(event_type, String::new(), payload)
    }

    /// Create an event that carries no payload.
    pub fn bare(event_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            scope: scope.into(),
            payload: None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope.is_empty()
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    /// Handlers are fire-and-forget: none of them reports failure back to the
    /// caller, so a slow or failing handler never affects the domain operation.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.event_type.clone());
        }
    }

    #[test]
    fn test_scoped_event_serializes_type_scope_and_payload() {
        let event = Event::new(
            event_type::SHIFT_CREATED,
            "team-red",
            json!({ "shift_id": 7 }),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({ "type": "shift.created", "scope": "team-red", "payload": { "shift_id": 7 } })
        );
    }

    #[test]
    fn test_global_bare_event_omits_scope_and_payload() {
        let event: Event = Event::bare(event_type::COVERAGE_UPDATED, "");

        assert!(event.is_global());
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"coverage.updated"}"#
        );
    }

    #[test]
    fn test_event_deserializes_without_optional_fields() {
        let event: Event = serde_json::from_str(r#"{"type":"event.lock_changed"}"#).unwrap();

        assert_eq!(event.event_type, event_type::EVENT_LOCK_CHANGED);
        assert!(event.is_global());
        assert_eq!(event.payload, None);
    }

    #[tokio::test]
    async fn test_publisher_calls_handlers_in_registration_order() {
        let first = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let second = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });

        let publisher = EventPublisher::new()
            .with_handler(first.clone())
            .with_handler(second.clone());
        assert_eq!(publisher.handler_count(), 2);

        publisher
            .publish(Event::global(event_type::SHIFT_DELETED, json!({ "shift_id": 1 })))
            .await;

        assert_eq!(*first.seen.lock().unwrap(), vec!["shift.deleted"]);
        assert_eq!(*second.seen.lock().unwrap(), vec!["shift.deleted"]);
    }

    #[test]
    fn test_with_handler_leaves_original_publisher_untouched() {
        let base = EventPublisher::new();
        let extended = base.clone().with_handler(Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        }));

        assert_eq!(base.handler_count(), 0);
        assert_eq!(extended.handler_count(), 1);
    }
}
