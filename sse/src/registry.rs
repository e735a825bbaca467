use crate::stats::Stats;
use crate::Message;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// Unique identifier for a subscribed client (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered subscriber: the producer end of its bounded queue plus the
/// scope it listens to. An empty filter listens to every scope.
#[derive(Debug)]
struct Client {
    sender: Sender<Message>,
    scope_filter: String,
}

impl Client {
    fn accepts(&self, scope: &str) -> bool {
        self.scope_filter.is_empty() || self.scope_filter == scope
    }
}

/// Per-process set of live subscribers.
///
/// Broadcasts iterate under shard read locks and never block on a client:
/// each delivery is a single `try_send`. Registration and removal take shard
/// write locks. A client is always removed from the map before its sender is
/// dropped, so an in-flight broadcast can never reach a closed queue.
pub struct Registry {
    clients: DashMap<ClientId, Client>,
    capacity: usize,
    stats: Arc<Stats>,
}

impl Registry {
    /// `capacity` is the fixed size of every client queue (at least 1).
    pub fn new(capacity: usize, stats: Arc<Stats>) -> Self {
        Self {
            clients: DashMap::new(),
            capacity: capacity.max(1),
            stats,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new client - O(1)
    pub fn subscribe(self: &Arc<Self>, scope_filter: impl Into<String>) -> (Receiver<Message>, Unsubscribe) {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let client_id = ClientId::new();
        let scope_filter = scope_filter.into();

        debug!(
            "Registering client {} with scope filter '{}'",
            client_id.as_str(),
            scope_filter
        );
        self.clients.insert(
            client_id.clone(),
            Client {
                sender,
                scope_filter,
            },
        );

        let unsubscribe = Unsubscribe {
            client_id,
            registry: Arc::clone(self),
        };
        (receiver, unsubscribe)
    }

    /// Remove a client and close its queue. Returns `false` if the client was
    /// already gone.
    pub fn unsubscribe(&self, client_id: &ClientId) -> bool {
        match self.clients.remove(client_id) {
            // The map entry held the only sender, dropping it closes the queue.
            Some((_, client)) => {
                drop(client);
                debug!("Unregistered client {}", client_id.as_str());
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Deliver `message` to every client whose filter matches `scope` - O(n)
    ///
    /// A full client queue drops the message for that client only. Returns the
    /// number of clients the message was enqueued to.
    pub fn broadcast(&self, message: &Message, scope: &str) -> usize {
        let mut delivered = 0;

        for entry in self.clients.iter() {
            let client = entry.value();
            if !client.accepts(scope) {
                continue;
            }

            match client.sender.try_send(Arc::clone(message)) {
                Ok(()) => {
                    delivered += 1;
                    self.stats.record_delivered();
                }
                Err(TrySendError::Full(_)) => {
                    self.stats.record_dropped_full();
                    warn!(
                        "Client {} queue is full (capacity {}); dropping message for scope '{}'",
                        entry.key().as_str(),
                        self.capacity,
                        scope
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        "Client {} stopped receiving; it will be removed on unsubscribe",
                        entry.key().as_str()
                    );
                }
            }
        }

        delivered
    }

    /// Close every client queue and empty the registry.
    pub fn close_all(&self) {
        let closing = self.clients.len();
        self.clients.clear();
        if closing > 0 {
            info!("Closed {closing} client queue(s)");
        }
    }
}

/// Handle returned by [`Registry::subscribe`] that removes the client again.
///
/// Calling [`Unsubscribe::unsubscribe`] more than once is a no-op. The handle
/// also unsubscribes when dropped, so a transport that simply drops it when
/// its connection ends cleans up correctly.
#[must_use = "dropping the handle unsubscribes the client immediately"]
pub struct Unsubscribe {
    client_id: ClientId,
    registry: Arc<Registry>,
}

impl Unsubscribe {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn unsubscribe(&self) {
        self.registry.unsubscribe(&self.client_id);
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> Arc<Registry> {
        Arc::new(Registry::new(capacity, Arc::new(Stats::default())))
    }

    fn message(body: &str) -> Message {
        Arc::from(body)
    }

    #[test]
    fn test_global_client_receives_every_scope() {
        let registry = registry(8);
        let (mut rx, _unsubscribe) = registry.subscribe("");

        registry.broadcast(&message("a"), "team-red");
        registry.broadcast(&message("b"), "");
        registry.broadcast(&message("c"), "team-blue");

        assert_eq!(&*rx.try_recv().unwrap(), "a");
        assert_eq!(&*rx.try_recv().unwrap(), "b");
        assert_eq!(&*rx.try_recv().unwrap(), "c");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scoped_client_only_receives_its_scope() {
        let registry = registry(8);
        let (mut red, _red_handle) = registry.subscribe("team-red");

        assert_eq!(registry.broadcast(&message("blue"), "team-blue"), 0);
        assert_eq!(registry.broadcast(&message("global"), ""), 0);
        assert_eq!(registry.broadcast(&message("red"), "team-red"), 1);

        assert_eq!(&*red.try_recv().unwrap(), "red");
        assert!(red.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_new_messages_and_keeps_oldest() {
        let stats = Arc::new(Stats::default());
        let registry = Arc::new(Registry::new(3, stats.clone()));
        let (mut slow, _slow_handle) = registry.subscribe("");
        let (mut fast, _fast_handle) = registry.subscribe("");

        for i in 0..5 {
            registry.broadcast(&message(&i.to_string()), "");
            // The fast consumer drains as it goes and is never affected.
            assert_eq!(&*fast.try_recv().unwrap(), i.to_string());
        }

        let received: Vec<String> = std::iter::from_fn(|| slow.try_recv().ok())
            .map(|m| m.to_string())
            .collect();
        assert_eq!(received, vec!["0", "1", "2"]);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped_full, 2);
        assert_eq!(snapshot.delivered, 8);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_closes_queue() {
        let registry = registry(4);
        let (mut rx, handle) = registry.subscribe("team-red");
        registry.broadcast(&message("before"), "team-red");
        assert_eq!(registry.count(), 1);

        handle.unsubscribe();
        handle.unsubscribe();
        assert_eq!(registry.count(), 0);
        assert!(!registry.unsubscribe(handle.client_id()));

        // Publishing after removal is harmless and never reaches the client.
        assert_eq!(registry.broadcast(&message("after"), "team-red"), 0);

        assert_eq!(&*rx.try_recv().unwrap(), "before");
        assert_eq!(
            rx.try_recv().unwrap_err(),
            mpsc::error::TryRecvError::Disconnected
        );
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let registry = registry(4);
        let (_rx, handle) = registry.subscribe("");
        assert_eq!(registry.count(), 1);

        drop(handle);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_dropped_receiver_does_not_count_as_delivery() {
        let registry = registry(4);
        let (rx, _handle) = registry.subscribe("");
        drop(rx);

        assert_eq!(registry.broadcast(&message("x"), ""), 0);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_close_all_closes_every_queue() {
        let registry = registry(4);
        let (mut a, handle_a) = registry.subscribe("");
        let (mut b, _handle_b) = registry.subscribe("team-red");

        registry.close_all();
        assert_eq!(registry.count(), 0);
        assert_eq!(a.try_recv().unwrap_err(), mpsc::error::TryRecvError::Disconnected);
        assert_eq!(b.try_recv().unwrap_err(), mpsc::error::TryRecvError::Disconnected);

        // Late unsubscribe after shutdown is a no-op.
        handle_a.unsubscribe();
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(registry(0).capacity(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_unsubscribe_during_broadcast() {
        let registry = registry(16);

        let broadcaster = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for i in 0..2_000 {
                    registry.broadcast(&message(&i.to_string()), "team-red");
                    tokio::task::yield_now().await;
                }
            })
        };

        let churn: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let (mut rx, handle) = registry.subscribe("team-red");
                        tokio::task::yield_now().await;
                        handle.unsubscribe();
                        while rx.recv().await.is_some() {}
                    }
                })
            })
            .collect();

        broadcaster.await.unwrap();
        for task in churn {
            task.await.unwrap();
        }
        assert_eq!(registry.count(), 0);
    }
}
