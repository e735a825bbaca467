//! Wire format shared by every broker instance on the bus.
//!
//! An envelope pairs the routing scope with the serialized event body:
//!
//! ```json
//! {"scope":"team-red","data":{"type":"shift.created","scope":"team-red","payload":{}}}
//! ```
//!
//! `data` is carried as raw JSON. The inbound side never re-serializes it, so
//! subscribers on every process receive exactly the bytes the publisher
//! produced. A missing `scope` decodes as the global scope. `data` must still
//! hold an event object with a `type`; anything else is rejected on decode.

use crate::error::Error;
use crate::Message;
use events::Event;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub scope: String,
    pub data: Box<RawValue>,
}

impl Envelope {
    /// Serialize `event` and wrap it, tagging the envelope with the event's scope.
    pub fn seal<P: Serialize>(event: &Event<P>) -> Result<Self, Error> {
        let inner = serde_json::to_string(event).map_err(Error::encode)?;
        let data = RawValue::from_string(inner).map_err(Error::encode)?;

        Ok(Self {
            scope: event.scope.clone(),
            data,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Error::encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        serde_json::from_str::<Event<IgnoredAny>>(envelope.data.get())?;
        Ok(envelope)
    }

    /// The serialized inner event, ready to hand to subscribers.
    pub fn message(&self) -> Message {
        Arc::from(self.data.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecErrorKind, ErrorKind};
    use events::event_type;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_seal_tags_envelope_with_event_scope() {
        let event = Event::new(event_type::SHIFT_CREATED, "team-red", json!({ "id": 1 }));

        let envelope = Envelope::seal(&event).unwrap();
        let wire: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();

        assert_eq!(
            wire,
            json!({
                "scope": "team-red",
                "data": { "type": "shift.created", "scope": "team-red", "payload": { "id": 1 } }
            })
        );
    }

    #[test]
    fn test_decoded_message_matches_locally_serialized_event() {
        let event = Event::new(event_type::COVERAGE_UPDATED, "event-42", json!({ "pct": 80 }));
        let local = serde_json::to_string(&event).unwrap();

        let bytes = Envelope::seal(&event).unwrap().encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();

        assert_eq!(decoded.scope, "event-42");
        assert_eq!(&*decoded.message(), local.as_str());
    }

    #[test]
    fn test_missing_scope_decodes_as_global() {
        let decoded = Envelope::decode(br#"{"data":{"type":"shift.deleted"}}"#).unwrap();

        assert_eq!(decoded.scope, "");
        assert_eq!(&*decoded.message(), r#"{"type":"shift.deleted"}"#);
    }

    #[test]
    fn test_malformed_envelopes_are_decode_errors() {
        for bytes in [
            &b"not json"[..],
            &br#"{"scope":"team-red"}"#[..],
            &br#"{"scope":7,"data":{}}"#[..],
            &b""[..],
            &br#"{"scope":"team-red","data":"garbage"}"#[..],
            &br#"{"scope":"team-red","data":[1,2,3]}"#[..],
            &br#"{"scope":"team-red","data":{"payload":{}}}"#[..],
        ] {
            let err = Envelope::decode(bytes).unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::Codec(CodecErrorKind::Decode));
        }
    }

    #[test]
    fn test_unserializable_payload_is_an_encode_error() {
        // serde_json refuses maps whose keys are not strings.
        let mut payload = HashMap::new();
        payload.insert((1u8, 2u8), "cell");
        let event = Event::new(event_type::SHIFT_UPDATED, "team-red", payload);

        let err = Envelope::seal(&event).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Codec(CodecErrorKind::Encode));
    }
}
