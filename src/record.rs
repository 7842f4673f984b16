// file: src/record.rs
// description: record model shared by operations, conveyors and io adapters
// reference: serde_json object maps validated once at stage entry

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key name of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Field value used for comparison and insertion. Always textual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue(String);

impl FieldValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a JSON value. Strings compare by content, numbers
    /// numerically when this value parses as one, anything else by its JSON
    /// text.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s == &self.0,
            Value::Number(n) => self.matches_number(n),
            other => other.to_string() == self.0,
        }
    }

    fn matches_number(&self, n: &serde_json::Number) -> bool {
        if let (Some(lhs), Ok(rhs)) = (n.as_i64(), self.0.parse::<i64>()) {
            return lhs == rhs;
        }

        match (n.as_f64(), self.0.parse::<f64>()) {
            (Some(lhs), Ok(rhs)) => lhs == rhs,
            _ => n.to_string() == self.0,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairKeyValue {
    pub key: Key,
    pub value: FieldValue,
}

impl PairKeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Key::new(key),
            value: FieldValue::new(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairKeyPrefix {
    pub key: Key,
    pub prefix: String,
}

impl PairKeyPrefix {
    pub fn new(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            key: Key::new(key),
            prefix: prefix.into(),
        }
    }

    pub fn prefixed_key(&self) -> String {
        format!("{}{}", self.prefix, self.key)
    }
}

/// A key/value record. Only JSON objects convert into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.0.get(key.as_str())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.0.contains_key(key.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        self.0.remove(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = PipelineError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PipelineError::TypeMismatch {
                found: json_kind(&other),
            }),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Payload tagged with the zero-based position the input stage read it at.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sequence: u64,
    pub payload: Value,
}

impl Envelope {
    pub fn new(sequence: u64, payload: Value) -> Self {
        Self { sequence, payload }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
