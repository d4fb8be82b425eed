//! Message event parser — validates the raw trigger payload.
//!
//! Required fields are checked in a fixed order (document, `senderId`,
//! `receiverId`) and the first missing one is reported. The body is carried
//! through as-is; placeholder substitution happens in the payload builder.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use chatping_common::error::ValidationError;
use chatping_common::types::{ChatMessageEvent, RawMessageEvent};

/// Parser for chat-message creation events.
pub struct MessageEventParser;

impl MessageEventParser {
    /// Validate `raw` and extract a canonical `ChatMessageEvent`.
    pub fn parse(raw: &RawMessageEvent) -> Result<ChatMessageEvent, ValidationError> {
        let document = match raw.document.as_ref() {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => return Err(ValidationError::MissingField("document")),
        };

        let sender_id = Self::required_str(document, "senderId")?;
        let receiver_id = Self::required_str(document, "receiverId")?;

        // `chatTextBody` is the field name older clients write.
        let body = ["body", "chatTextBody"]
            .iter()
            .find_map(|key| {
                document
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
            })
            .map(str::to_string);

        let timestamp = document
            .get("timestamp")
            .and_then(Self::parse_timestamp)
            .unwrap_or_else(Utc::now);

        Ok(ChatMessageEvent {
            chat_id: raw.chat_id.clone(),
            message_id: raw.message_id.clone(),
            sender_id,
            receiver_id,
            body,
            timestamp,
        })
    }

    fn required_str(
        document: &Map<String, Value>,
        field: &'static str,
    ) -> Result<String, ValidationError> {
        document
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(ValidationError::MissingField(field))
    }

    /// Accepts RFC 3339 strings, epoch milliseconds, or a `{seconds, nanos}`
    /// object (with or without leading underscores).
    fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .or_else(|| map.get("nanos"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
            }
            _ => None,
        }
    }
}
