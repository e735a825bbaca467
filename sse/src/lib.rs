//! Real-time event distribution for Server-Sent Events (SSE) streams.
//!
//! This crate pushes state-change notifications from backend mutations to
//! every connected client stream, across all server processes behind the load
//! balancer.
//!
//! # Architecture
//!
//! - **Envelope**: wire format pairing a routing scope with the serialized
//!   event, identical on every process.
//! - **Registry**: per-process set of subscribers, each with a bounded queue
//!   and a scope filter. Delivery never blocks: a full queue drops the message
//!   for that client only.
//! - **Bus**: shared pub/sub transport (Redis in production, in-memory for a
//!   single node and tests).
//! - **Bridge**: writes envelopes to the bus and runs the inbound loop that
//!   decodes envelopes from any process and broadcasts them locally.
//! - **Broker**: owns all of the above; `publish`, `subscribe`, `close`.
//!
//! # Message Flow
//!
//! 1. A domain service publishes an `events::Event` (directly or through an
//!    `EventPublisher` with [`BrokerEventHandler`] registered)
//! 2. The bridge seals it into an envelope and writes it to the bus channel
//! 3. Every broker's inbound loop (the publisher's included) decodes it
//! 4. The registry enqueues the inner event to local clients whose filter is
//!    empty or equal to the event scope
//! 5. The transport streams the queued messages to the browser
//!
//! If the bus write fails, step 2 falls back to delivering on the publishing
//! process only.
//!
//! # Delivery guarantees
//!
//! Best effort and at most once. No replay, no cross-process ordering.
//! Every drop is logged and counted in [`StatsSnapshot`].

pub mod bridge;
pub mod broker;
pub mod bus;
pub mod domain_event_handler;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod stats;

use std::sync::Arc;

/// A serialized event as delivered to subscribers. Shared between every
/// client a broadcast reaches.
pub type Message = Arc<str>;

pub use broker::{Broker, BrokerConfig};
pub use events::DEFAULT_CLIENT_CAPACITY;
pub use domain_event_handler::BrokerEventHandler;
pub use registry::{ClientId, Unsubscribe};
pub use stats::StatsSnapshot;
