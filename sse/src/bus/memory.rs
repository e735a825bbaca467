//! In-memory bus for single-process mode.
//!
//! Uses one tokio broadcast channel per channel name. Clones share the same
//! channels, so several brokers in one process (or one test) can talk to each
//! other exactly as separate processes would over Redis.

use super::{Bus, BusMessage, BusStream};
use crate::error::{BusErrorKind, Error};
use async_stream::stream;
use async_trait::async_trait;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryBus {
    channels: Arc<DashMap<String, broadcast::Sender<Arc<[u8]>>>>,
    capacity: usize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages a subscriber may fall behind by before it starts losing them.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Arc<[u8]>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Drop every channel. Open subscriptions see their stream end, the same
    /// way a lost Redis connection ends a subscription.
    pub fn shutdown(&self) {
        self.channels.clear();
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), Error> {
        // With no subscriber anywhere the message is simply lost, as with Redis.
        let receivers = self.sender(channel).send(Arc::from(payload)).unwrap_or(0);
        trace!("Published to '{channel}' ({receivers} receiver(s))");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusStream, Error> {
        let mut receiver = self.sender(channel).subscribe();
        let channel = channel.to_string();

        let stream = stream! {
            loop {
                match receiver.recv().await {
                    Ok(payload) => yield BusMessage::Payload(payload.to_vec()),
                    Err(RecvError::Lagged(skipped)) => {
                        trace!("Subscriber on '{channel}' lagged by {skipped} message(s)");
                        yield BusMessage::Lagged(skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// A bus whose writes always fail. Models an unreachable or misconfigured
/// bus; subscriptions never yield.
#[derive(Clone, Default)]
pub struct UnavailableBus;

#[async_trait]
impl Bus for UnavailableBus {
    async fn publish(&self, channel: &str, _payload: Vec<u8>) -> Result<(), Error> {
        Err(Error::bus(
            BusErrorKind::Publish,
            format!("bus unavailable, cannot publish to '{channel}'"),
        ))
    }

    async fn subscribe(&self, channel: &str) -> Result<BusStream, Error> {
        Err(Error::bus(
            BusErrorKind::Subscribe,
            format!("bus unavailable, cannot subscribe to '{channel}'"),
        ))
    }
}
