use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A field of a partial-update payload: absent, explicitly cleared, or set.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Omitted,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    /// Applies the patch on top of the current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Omitted => current,
            Patch::Null => None,
            Patch::Value(value) => Some(value),
        }
    }
}

pub fn classify<T: DeserializeOwned>(value: Option<&Value>) -> Result<Patch<T>, String> {
    match value {
        None => Ok(Patch::Omitted),
        Some(Value::Null) => Ok(Patch::Null),
        Some(other) => serde_json::from_value(other.clone())
            .map(Patch::Value)
            .map_err(|err| err.to_string()),
    }
}

/// Reads `key` out of a metadata object, treating blank strings as null.
pub fn field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Result<Patch<T>, String> {
    match object.get(key) {
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Patch::Null),
        other => classify(other),
    }
}
