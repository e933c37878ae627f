//! Core event types for Hatari.
//!
//! An [`Event`] is a mapping from property names to [`PropertyValue`]s. The
//! value type is a closed union, so every consumer (validation, composition,
//! serialization) handles every shape exhaustively.
//!
//! # Wire format
//!
//! Values serialize to plain JSON. Timestamps are rendered as RFC 3339 strings
//! with millisecond precision rather than numeric epochs:
//!
//! ```json
//! {
//!   "hatari": { "timestamp": "2025-12-11T10:00:00.000Z" },
//!   "item": "golden gadget",
//!   "price": 2550,
//!   "buyer": { "id": 42, "premium": true }
//! }
//! ```

use crate::error::{HatariError, HatariResult};
use crate::{METADATA_KEY, TIMESTAMP_KEY};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// An event (or nested mapping, or metadata block): property name to value.
pub type Event = BTreeMap<String, PropertyValue>;

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Map(Event),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Returns the string if this is a `String` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested mapping if this is a `Map` value
    pub fn as_map(&self) -> Option<&Event> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the instant if this is a `Timestamp` value
    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            PropertyValue::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the number if this is a `Number` value
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            PropertyValue::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// Render a timestamp the way the collection API expects it.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::String(s) => serializer.serialize_str(s),
            PropertyValue::Number(n) => n.serialize(serializer),
            PropertyValue::Boolean(b) => serializer.serialize_bool(*b),
            PropertyValue::Timestamp(t) => serializer.serialize_str(&format_timestamp(t)),
            PropertyValue::Map(m) => m.serialize(serializer),
            PropertyValue::List(items) => items.serialize(serializer),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Number(value.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Number(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Number(value.into())
    }
}

impl TryFrom<f64> for PropertyValue {
    type Error = HatariError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Number::from_f64(value)
            .map(PropertyValue::Number)
            .ok_or_else(|| HatariError::InvalidEvent(format!("{} is not a finite number", value)))
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

impl From<Event> for PropertyValue {
    fn from(value: Event) -> Self {
        PropertyValue::Map(value)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        PropertyValue::List(value)
    }
}

impl TryFrom<Value> for PropertyValue {
    type Error = HatariError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(HatariError::InvalidEvent(
                "null property values are not supported".into(),
            )),
            Value::Bool(b) => Ok(PropertyValue::Boolean(b)),
            Value::Number(n) => Ok(PropertyValue::Number(n)),
            Value::String(s) => Ok(PropertyValue::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(PropertyValue::try_from)
                .collect::<HatariResult<Vec<_>>>()
                .map(PropertyValue::List),
            Value::Object(map) => event_from_map(map).map(PropertyValue::Map),
        }
    }
}

/// Convert a JSON object into an [`Event`].
///
/// Fails with [`HatariError::InvalidEvent`] for anything that is not an
/// object, or for objects containing `null` at any depth.
pub fn event_from_json(value: Value) -> HatariResult<Event> {
    match value {
        Value::Object(map) => event_from_map(map),
        other => Err(HatariError::InvalidEvent(format!(
            "an event must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn event_from_map(map: serde_json::Map<String, Value>) -> HatariResult<Event> {
    map.into_iter()
        .map(|(key, value)| PropertyValue::try_from(value).map(|v| (key, v)))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The final outbound body: the caller's event enriched with global
/// properties and the reserved metadata block.
///
/// Built by [`compose`](crate::compose::compose); independent of the event it
/// was composed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComposedPayload(Event);

impl ComposedPayload {
    pub(crate) fn new(properties: Event) -> Self {
        Self(properties)
    }

    /// The metadata block stored under the reserved key
    pub fn metadata(&self) -> Option<&Event> {
        self.0.get(METADATA_KEY).and_then(PropertyValue::as_map)
    }

    /// The metadata timestamp, if it is a timestamp value
    pub fn timestamp(&self) -> Option<&DateTime<Utc>> {
        self.metadata()
            .and_then(|m| m.get(TIMESTAMP_KEY))
            .and_then(PropertyValue::as_timestamp)
    }

    /// Look up a top-level property
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// All top-level properties, including the metadata block
    pub fn properties(&self) -> &Event {
        &self.0
    }

    /// Encode the payload as a JSON body
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl From<ComposedPayload> for Event {
    fn from(payload: ComposedPayload) -> Self {
        payload.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_serialize() {
        let mut buyer = Event::new();
        buyer.insert("id".into(), 42.into());
        buyer.insert("premium".into(), true.into());

        let mut event = Event::new();
        event.insert("item".into(), "golden gadget".into());
        event.insert("price".into(), 2550.into());
        event.insert("buyer".into(), buyer.into());
        event.insert(
            "tags".into(),
            vec![PropertyValue::from("a"), PropertyValue::from("b")].into(),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "item": "golden gadget",
                "price": 2550,
                "buyer": {"id": 42, "premium": true},
                "tags": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_timestamp_rendered_as_string() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 11, 10, 0, 0).unwrap();
        let value = serde_json::to_value(PropertyValue::Timestamp(ts)).unwrap();
        assert_eq!(value, json!("2025-12-11T10:00:00.000Z"));
    }

    #[test]
    fn test_event_from_json() {
        let event = event_from_json(json!({
            "x": "y",
            "n": 1.5,
            "nested": {"deep": [1, {"k": false}]}
        }))
        .unwrap();

        assert_eq!(event.get("x").and_then(PropertyValue::as_str), Some("y"));
        assert!(event.get("n").and_then(PropertyValue::as_number).is_some());
        let nested = event.get("nested").and_then(PropertyValue::as_map).unwrap();
        assert!(matches!(nested.get("deep"), Some(PropertyValue::List(items)) if items.len() == 2));
    }

    #[test]
    fn test_event_from_json_rejects_null_and_non_objects() {
        assert!(matches!(
            event_from_json(json!({"a": {"b": null}})),
            Err(HatariError::InvalidEvent(_))
        ));
        assert!(matches!(
            event_from_json(json!(["not", "an", "object"])),
            Err(HatariError::InvalidEvent(msg)) if msg.contains("an array")
        ));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(PropertyValue::try_from(f64::NAN).is_err());
        assert!(PropertyValue::try_from(2.5).is_ok());
    }

    #[test]
    fn test_composed_payload_accessors() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut metadata = Event::new();
        metadata.insert(TIMESTAMP_KEY.into(), ts.into());

        let mut properties = Event::new();
        properties.insert(METADATA_KEY.into(), metadata.into());
        properties.insert("x".into(), "y".into());

        let payload = ComposedPayload::new(properties);
        assert_eq!(payload.timestamp(), Some(&ts));
        assert_eq!(payload.get("x").and_then(PropertyValue::as_str), Some("y"));

        let body: Value = serde_json::from_slice(&payload.to_json().unwrap()).unwrap();
        assert_eq!(body["hatari"]["timestamp"], "2024-01-02T03:04:05.000Z");
    }
}
