use crate::bridge::Bridge;
use crate::bus::Bus;
use crate::registry::{Registry, Unsubscribe};
use crate::stats::{Stats, StatsSnapshot};
use crate::Message;
use events::{Event, DEFAULT_CLIENT_CAPACITY};
use log::*;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Bus channel shared by every broker in the deployment.
    pub channel: String,
    /// Per-client queue capacity.
    pub client_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel: events::DEFAULT_BUS_CHANNEL.to_string(),
            client_capacity: DEFAULT_CLIENT_CAPACITY,
        }
    }
}

/// Composition root of the real-time delivery layer.
///
/// One broker per process. It owns the local registry and the bus bridge,
/// runs the inbound loop as a background task and is the single entry point
/// for domain code (`publish`) and transports (`subscribe`).
///
/// The broker is `Running` from construction until [`Broker::close`]. Callers
/// must stop using it after closing: a `publish` after close is discarded and
/// a `subscribe` after close yields an already-closed receiver.
pub struct Broker {
    registry: Arc<Registry>,
    bridge: Arc<Bridge>,
    stats: Arc<Stats>,
    cancel: CancellationToken,
    inbound: Mutex<Option<JoinHandle<()>>>,
}

impl Broker {
    /// Build a broker on `bus` and start its inbound loop.
    ///
    /// If the bus subscription cannot be opened the broker still starts, in
    /// local-only mode: publishes reach the bus when possible and this
    /// process's subscribers directly.
    pub async fn new(bus: Arc<dyn Bus>, config: BrokerConfig) -> Self {
        let stats = Arc::new(Stats::default());
        let registry = Arc::new(Registry::new(config.client_capacity, Arc::clone(&stats)));
        let bridge = Arc::new(Bridge::new(
            bus,
            config.channel,
            Arc::clone(&registry),
            Arc::clone(&stats),
        ));
        let cancel = CancellationToken::new();

        let inbound = match bridge.listen().await {
            Ok(stream) => Some(tokio::spawn(
                Arc::clone(&bridge).run(stream, cancel.child_token()),
            )),
            Err(e) => {
                error!(
                    "Could not subscribe to bus channel '{}', running in local-only mode: {e}",
                    bridge.channel()
                );
                None
            }
        };

        info!(
            "Broker started on channel '{}' (client capacity {})",
            bridge.channel(),
            registry.capacity()
        );

        Self {
            registry,
            bridge,
            stats,
            cancel,
            inbound: Mutex::new(inbound),
        }
    }

    /// Publish an event to matching subscribers on every broker.
    ///
    /// Fire-and-forget: failures are logged and counted, never returned.
    pub async fn publish<P: Serialize>(&self, event: &Event<P>) {
        if self.is_closed() {
            debug!(
                "Broker is closed, discarding '{}' event for scope '{}'",
                event.event_type, event.scope
            );
            return;
        }

        self.bridge.publish(event).await;
    }

    /// Register a local subscriber.
    ///
    /// An empty `scope_filter` receives every event. The returned receiver
    /// yields serialized events; the [`Unsubscribe`] handle must be kept alive
    /// for as long as the connection is open.
    pub fn subscribe(&self, scope_filter: impl Into<String>) -> (Receiver<Message>, Unsubscribe) {
        let (receiver, unsubscribe) = self.registry.subscribe(scope_filter);

        if self.is_closed() {
            warn!("Subscribe called on a closed broker");
            unsubscribe.unsubscribe();
        }

        (receiver, unsubscribe)
    }

    pub fn client_count(&self) -> usize {
        self.registry.count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether cross-process events are currently being received.
    pub fn is_listening(&self) -> bool {
        self.bridge.is_listening()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the inbound loop, then close every client queue.
    pub async fn close(&self) {
        self.cancel.cancel();

        let inbound = self.inbound.lock().await.take();
        if let Some(task) = inbound {
            if let Err(e) = task.await {
                warn!("Inbound loop task did not finish cleanly: {e}");
            }
        }

        self.registry.close_all();
        info!("Broker closed");
    }
}
