//! This module holds typed parameters for endpoint inputs.
//!
//! Each parameter type is a struct deserialized by an axum extractor, so inputs
//! are validated by type before they reach handler logic.

pub(crate) mod sse;
