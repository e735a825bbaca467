//! Delivery counters.
//!
//! Every drop or degradation in the delivery path is logged and counted here,
//! so overflow and bus failures can be told apart from bugs.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    delivered: AtomicU64,
    dropped_full: AtomicU64,
    serialization_failures: AtomicU64,
    bus_fallbacks: AtomicU64,
    inbound_received: AtomicU64,
    decode_failures: AtomicU64,
    bus_lagged: AtomicU64,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages enqueued to a client queue.
    pub delivered: u64,
    /// Messages discarded because a client queue was full.
    pub dropped_full: u64,
    /// Publishes abandoned because the event could not be serialized.
    pub serialization_failures: u64,
    /// Publishes delivered locally only because the bus write failed.
    pub bus_fallbacks: u64,
    /// Messages read off the bus by the inbound loop.
    pub inbound_received: u64,
    /// Inbound messages skipped because the envelope or event was malformed.
    pub decode_failures: u64,
    /// Bus messages lost because the inbound loop fell behind the bus.
    pub bus_lagged: u64,
}

impl Stats {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_serialization_failure(&self) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bus_fallback(&self) {
        self.bus_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inbound(&self) {
        self.inbound_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bus_lagged(&self, skipped: u64) {
        self.bus_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            bus_fallbacks: self.bus_fallbacks.load(Ordering::Relaxed),
            inbound_received: self.inbound_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            bus_lagged: self.bus_lagged.load(Ordering::Relaxed),
        }
    }
}
