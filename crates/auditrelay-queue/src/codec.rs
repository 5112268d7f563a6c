//! JSON wire encoding of entries.

use auditrelay_types::Entry;
use bytes::Bytes;

/// Encode an entry for the wire.
pub fn encode_entry(entry: &Entry) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(entry).map(Bytes::from)
}

/// Decode an entry received from the wire.
pub fn decode_entry(payload: &[u8]) -> Result<Entry, serde_json::Error> {
    serde_json::from_slice(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrelay_types::{normalize, FixedClock, Payload};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_roundtrip_keeps_invariants() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let entry = normalize(
            Entry::new("login")
                .with_request_id("req-1")
                .with_request(json!({"user": "alice"}))
                .with_response(Payload::text("ok")),
            &clock,
        )
        .unwrap();

        let decoded = decode_entry(&encode_entry(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
        assert!(decoded.is_normalized());
    }

    #[test]
    fn test_subsecond_precision_survives() {
        let at = Utc.timestamp_nanos(1_704_164_645_123_456_789);
        let entry = Entry::new("x").with_id("1").with_created_at(at);
        let decoded = decode_entry(&encode_entry(&entry).unwrap()).unwrap();
        assert_eq!(decoded.created_at, Some(at));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(decode_entry(b"not json").is_err());
        assert!(decode_entry(br#"{"id":"only-id"}"#).is_err());
        assert!(decode_entry(b"").is_err());
    }
}
