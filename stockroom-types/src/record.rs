use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised when a JSON value cannot be used as a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no `id` field")]
    MissingId,

    #[error("record id must be a string or a number, got {0}")]
    InvalidId(String),
}

/// Stable identifier of a record within its partition.
///
/// Backend ids arrive as integers (`3`) or strings (`"SALE-2024..."`); both
/// are kept in their canonical JSON text form so `3` and `"3"` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the id of a JSON value, rejecting null, booleans and containers.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        match value {
            Value::String(s) if !s.is_empty() => Ok(Self(s.clone())),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(RecordError::InvalidId(other.to_string())),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A business row as returned by the backend.
///
/// The store never looks at business fields; only `id` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    pub id: RecordId,
    pub data: Value,
}

impl Record {
    pub fn from_json(data: Value) -> Result<Self, RecordError> {
        let id = match &data {
            Value::Object(map) => map.get("id").ok_or(RecordError::MissingId)?,
            _ => return Err(RecordError::NotAnObject),
        };
        let id = RecordId::from_json(id)?;
        Ok(Self { id, data })
    }

    /// Reads a field by JSON pointer, e.g. `/quantity`.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.data.pointer(pointer)
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.data
    }
}
