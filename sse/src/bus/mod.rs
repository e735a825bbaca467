//! Shared publish/subscribe transport between broker instances.
//!
//! This module contains:
//! - `Bus` trait: raw byte publish and channel subscription
//! - `MemoryBus`: in-process implementation (single node, tests)
//! - `RedisBus`: Redis pub/sub for multi-process deployments

use crate::error::Error;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_pubsub;

pub use memory::{MemoryBus, UnavailableBus};
#[cfg(feature = "redis")]
pub use redis_pubsub::RedisBus;

/// One item read off a bus subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// A message as published, byte for byte.
    Payload(Vec<u8>),
    /// The subscriber fell behind and this many messages were lost.
    Lagged(u64),
}

/// Stream of messages received on a channel. The stream ending means the
/// underlying subscription is gone.
pub type BusStream = BoxStream<'static, BusMessage>;

/// Interface to the cross-process message bus.
///
/// Implementations:
/// - `MemoryBus`: tokio broadcast channels inside one process
/// - `RedisBus`: Redis PUBLISH/SUBSCRIBE
#[async_trait]
pub trait Bus: Send + Sync {
    /// Write one message to `channel`. Returns once the bus accepted it.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), Error>;

    /// Start receiving every message published to `channel` from now on,
    /// including this process's own publishes.
    async fn subscribe(&self, channel: &str) -> Result<BusStream, Error>;
}
