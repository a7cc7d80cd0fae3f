//! Chat message record and its wire codec.
//!
//! A `ChatMessage` is what travels over the `chat-messages` channel and what
//! is pushed to clients as `receivePrivateMessage`.

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::identity::{Identity, UserId};

/// A one-to-one message as published to the durable log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: UserId,
    pub sender_username: String,
    pub recipient_id: UserId,
    pub recipient_username: String,
    pub content: String,
    #[serde(with = "wire_time")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message with a fresh time-ordered id.
    ///
    /// The timestamp is truncated to the millisecond precision of the wire.
    pub fn new(
        sender: &Identity,
        recipient: &Identity,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sender_id: sender.user_id.clone(),
            sender_username: sender.username.clone(),
            recipient_id: recipient.user_id.clone(),
            recipient_username: recipient.username.clone(),
            content: content.into(),
            timestamp: timestamp.trunc_subsecs(3),
        }
    }

    /// True when the message was sent to oneself.
    pub fn is_self_addressed(&self) -> bool {
        self.sender_id == self.recipient_id
    }
}

/// JSON encoding shared by every record that crosses the broker.
pub trait WireRecord: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl WireRecord for ChatMessage {}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
///
/// Decoding accepts any RFC 3339 offset; encoding always emits UTC.
pub mod wire_time {
    use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc).trunc_subsecs(3))
            .map_err(serde::de::Error::custom)
    }
}

/// Publish-time clock: millisecond precision, never moves backwards.
#[derive(Debug)]
pub struct MessageClock {
    last: Mutex<DateTime<Utc>>,
}

impl MessageClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let candidate = Utc::now().trunc_subsecs(3);
        let mut last = self.last.lock();
        if candidate > *last {
            *last = candidate;
        }
        *last
    }
}

impl Default for MessageClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample() -> ChatMessage {
        let alice = Identity::new("a-1", "alice");
        let bob = Identity::new("b-2", "bob");
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        ChatMessage::new(&alice, &bob, "hi", ts)
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let json: serde_json::Value = serde_json::from_str(&sample().encode().unwrap()).unwrap();
        for field in [
            "id",
            "senderId",
            "senderUsername",
            "recipientId",
            "recipientUsername",
            "content",
            "timestamp",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00.123Z");
    }

    #[test]
    fn test_round_trip_is_identical() {
        let message = sample();
        let encoded = message.encode().unwrap();
        let decoded = ChatMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn test_sub_millisecond_timestamp_survives_round_trip() {
        let alice = Identity::new("a-1", "alice");
        let ts = Utc::now().trunc_subsecs(3) + chrono::Duration::microseconds(456);
        let message = ChatMessage::new(&alice, &alice, "hi", ts);

        assert_eq!(message.timestamp, ts.trunc_subsecs(3));
        let decoded = ChatMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_truncates_extra_precision() {
        let raw = r#"{"id":"1","senderId":"a","senderUsername":"alice","recipientId":"b",
            "recipientUsername":"bob","content":"hey","timestamp":"2024-05-01T10:00:00.123456Z"}"#;
        let decoded = ChatMessage::decode(raw).unwrap();
        assert_eq!(decoded.timestamp.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(ChatMessage::decode(&decoded.encode().unwrap()).unwrap(), decoded);
    }

    #[test]
    fn test_decodes_offset_timestamps() {
        let raw = r#"{"id":"1","senderId":"a","senderUsername":"alice","recipientId":"b",
            "recipientUsername":"bob","content":"hey","timestamp":"2024-05-01T12:00:00.5+02:00"}"#;
        let decoded = ChatMessage::decode(raw).unwrap();
        assert_eq!(wire_time::format(&decoded.timestamp), "2024-05-01T10:00:00.500Z");
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(ChatMessage::decode(r#"{"id":"1","content":"x"}"#).is_err());
        assert!(ChatMessage::decode("not json").is_err());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = MessageClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= previous);
            assert_eq!(next.timestamp_subsec_nanos() % 1_000_000, 0);
            previous = next;
        }
    }
}
