//! Event payloads as delivered to listeners.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::property::PropertyPath;

/// One fired event: a timestamp in milliseconds plus camelCase fields.
///
/// The timestamp is mirrored into the `timestamp` field so that it can be
/// tracked like any other property.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    timestamp: f64,
    fields: Map<String, Value>,
}

impl EventPayload {
    pub fn new(timestamp: f64) -> Self {
        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), Value::from(timestamp));
        Self { timestamp, fields }
    }

    /// Wraps an arbitrary JSON object. Non-object values yield an empty payload.
    pub fn from_value(timestamp: f64, value: Value) -> Self {
        let mut payload = Self::new(timestamp);
        if let Value::Object(map) = value {
            for (key, value) in map {
                if key != "timestamp" {
                    payload.fields.insert(key, value);
                }
            }
        }
        payload
    }

    /// Sets a top-level field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a top-level field from any serializable value (nested objects).
    ///
    /// Values that fail to serialize are stored as `null`.
    pub fn with_object<T: Serialize>(mut self, key: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        if key == "timestamp" {
            return;
        }
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Reads the field addressed by `path`.
    ///
    /// A field that this payload does not carry reads as `null`.
    pub fn extract(&self, path: &PropertyPath) -> Value {
        let scope = match path.scope().key() {
            None => Some(&self.fields),
            Some(key) => self.fields.get(key).and_then(Value::as_object),
        };
        scope
            .and_then(|fields| fields.get(path.field()))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
