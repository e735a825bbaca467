use crate::Broker;
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;
use std::sync::Arc;

/// Forwards domain events to the broker for real-time delivery.
///
/// Domain services never talk to the broker directly: they publish through an
/// `events::EventPublisher` that has this handler registered, and the broker
/// takes care of fanning the event out to every process.
pub struct BrokerEventHandler {
    broker: Arc<Broker>,
}

impl BrokerEventHandler {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl EventHandler for BrokerEventHandler {
    async fn handle(&self, event: &Event) {
        debug!(
            "Handling '{}' event for scope '{}'",
            event.event_type, event.scope
        );
        self.broker.publish(event).await;
    }
}
