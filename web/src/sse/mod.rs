//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the SSE endpoint.
//! Subscriber bookkeeping and cross-process fanout live in the `sse` crate.

pub mod handler;
