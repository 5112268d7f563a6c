//! Opaque request/response payloads.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Body attached to an entry.
///
/// Payloads travel on the wire as JSON and are turned into text at the
/// storage boundary. Text and raw bytes are stored as-is; structured values
/// are stored as their JSON encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Arbitrary structured data.
    Structured(Value),
    /// Plain text, stored unchanged.
    Text(String),
    /// Raw bytes, typically an already-encoded JSON document.
    Raw(Vec<u8>),
}

impl Payload {
    /// Wrap a structured value. JSON strings become [`Payload::Text`].
    pub fn json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }

    /// Wrap plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Wrap raw bytes.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Raw(bytes.into())
    }

    /// Serialize a value into a structured payload.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::json)
    }

    /// Whether this payload carries nothing worth storing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(Value::String(s)) | Self::Text(s) => s.trim().is_empty(),
            Self::Structured(v) => v.is_null(),
            Self::Raw(b) => b.is_empty(),
        }
    }

    /// Text form written to storage, or `None` for an empty payload.
    pub fn to_column_text(&self) -> Result<Option<String>, serde_json::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        match self {
            Self::Structured(Value::String(s)) | Self::Text(s) => Ok(Some(s.clone())),
            Self::Structured(v) => serde_json::to_string(v).map(Some),
            Self::Raw(b) => Ok(Some(String::from_utf8_lossy(b).into_owned())),
        }
    }

    fn to_wire_value(&self) -> Value {
        match self {
            Self::Structured(v) => v.clone(),
            Self::Text(s) => Value::String(s.clone()),
            Self::Raw(b) => serde_json::from_slice(b)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(b).into_owned())),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::json)
    }
}
