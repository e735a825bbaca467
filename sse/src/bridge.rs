use crate::bus::{Bus, BusMessage, BusStream};
use crate::envelope::Envelope;
use crate::error::Error;
use crate::registry::Registry;
use crate::stats::Stats;
use events::Event;
use futures::StreamExt;
use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Connects the local registry to the shared bus.
///
/// Outbound, every event is sealed into an envelope and written to the bus
/// channel; the inbound loop of each broker (this one included) delivers it.
/// Inbound, envelopes read off the bus are decoded and broadcast locally.
pub struct Bridge {
    bus: Arc<dyn Bus>,
    channel: String,
    registry: Arc<Registry>,
    stats: Arc<Stats>,
    listening: AtomicBool,
}

impl Bridge {
    pub fn new(
        bus: Arc<dyn Bus>,
        channel: impl Into<String>,
        registry: Arc<Registry>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            bus,
            channel: channel.into(),
            registry,
            stats,
            listening: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the inbound loop is currently receiving from the bus.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Publish an event to every broker on the bus.
    ///
    /// An event that cannot be serialized is dropped, never retried. If the bus
    /// rejects the write, the event is delivered to this process's subscribers
    /// only. While the inbound loop is not running this process would never
    /// see its own publish come back, so it is delivered locally as well.
    pub async fn publish<P: Serialize>(&self, event: &Event<P>) {
        let (envelope, bytes) = match Envelope::seal(event)
            .and_then(|envelope| envelope.encode().map(|bytes| (envelope, bytes)))
        {
            Ok(sealed) => sealed,
            Err(e) => {
                self.stats.record_serialization_failure();
                error!(
                    "Failed to serialize '{}' event for scope '{}', dropping it: {e}",
                    event.event_type, event.scope
                );
                return;
            }
        };

        match self.bus.publish(&self.channel, bytes).await {
            Ok(()) if !self.is_listening() => {
                debug!(
                    "Inbound loop is down, delivering '{}' event locally",
                    event.event_type
                );
                self.registry.broadcast(&envelope.message(), &envelope.scope);
            }
            Ok(()) => {}
            Err(e) => {
                self.stats.record_bus_fallback();
                warn!(
                    "Bus publish of '{}' event to '{}' failed, delivering to local subscribers only: {e}",
                    event.event_type, self.channel
                );
                self.registry.broadcast(&envelope.message(), &envelope.scope);
            }
        }
    }

    /// Open the inbound subscription. Done before the loop task is spawned so
    /// that nothing published after broker construction is missed.
    pub async fn listen(&self) -> Result<BusStream, Error> {
        let inbound = self.bus.subscribe(&self.channel).await?;
        self.listening.store(true, Ordering::Release);
        Ok(inbound)
    }

    /// Inbound loop: runs until `cancel` fires or the bus stream ends.
    pub async fn run(self: Arc<Self>, mut inbound: BusStream, cancel: CancellationToken) {
        info!("Inbound loop started on bus channel '{}'", self.channel);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Inbound loop on '{}' cancelled", self.channel);
                    break;
                }
                next = inbound.next() => match next {
                    Some(BusMessage::Payload(bytes)) => self.deliver(&bytes),
                    Some(BusMessage::Lagged(skipped)) => {
                        self.stats.record_bus_lagged(skipped);
                        warn!(
                            "Inbound loop on '{}' fell behind the bus, {skipped} message(s) lost",
                            self.channel
                        );
                    }
                    None => {
                        // No resubscription: the process must be restarted.
                        error!(
                            "Bus subscription on '{}' ended; cross-process delivery is stopped until restart",
                            self.channel
                        );
                        break;
                    }
                },
            }
        }

        self.listening.store(false, Ordering::Release);
    }

    /// Decode one inbound message and broadcast it locally. Malformed messages
    /// are skipped.
    fn deliver(&self, bytes: &[u8]) {
        self.stats.record_inbound();

        match Envelope::decode(bytes) {
            Ok(envelope) => {
                let delivered = self
                    .registry
                    .broadcast(&envelope.message(), &envelope.scope);
                trace!(
                    "Delivered inbound message for scope '{}' to {delivered} client(s)",
                    envelope.scope
                );
            }
            Err(e) => {
                self.stats.record_decode_failure();
                warn!(
                    "Skipping malformed message ({} bytes) on '{}': {e}",
                    bytes.len(),
                    self.channel
                );
            }
        }
    }
}
