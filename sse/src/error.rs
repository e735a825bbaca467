//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other crates in the workspace: a root
//! `Error` struct holding an error kind tree and an optional source for
//! error chaining. None of these errors ever reach a caller of
//! `Broker::publish`; they are logged and turned into fallbacks or drops.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the delivery layer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Codec(CodecErrorKind),
    Bus(BusErrorKind),
}

/// Errors from turning events into envelopes and back.
#[derive(Debug, PartialEq)]
pub enum CodecErrorKind {
    Encode,
    Decode,
}

/// Errors from the shared message bus.
#[derive(Debug, PartialEq)]
pub enum BusErrorKind {
    InvalidUrl,
    Connection,
    Publish,
    Subscribe,
}

impl Error {
    pub fn with_source(
        error_kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn bus(kind: BusErrorKind, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::with_source(ErrorKind::Bus(kind), source)
    }

    pub fn encode(source: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::Codec(CodecErrorKind::Encode), source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "SSE Error ({:?}): {source}", self.error_kind),
            None => write!(f, "SSE Error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// serde_json reports serialization failures with the same categories as parse
// failures, so `?` on a serde_json result always means decoding. Encoding call
// sites use `Error::encode` explicitly.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Codec(CodecErrorKind::Decode), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_maps_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = err.into();

        assert_eq!(err.error_kind, ErrorKind::Codec(CodecErrorKind::Decode));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display_includes_kind_and_source() {
        let err = Error::bus(BusErrorKind::Publish, "bus unavailable");

        let rendered = err.to_string();
        assert!(rendered.contains("Publish"));
        assert!(rendered.contains("bus unavailable"));
    }
}
