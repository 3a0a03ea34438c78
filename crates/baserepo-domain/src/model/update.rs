//! UpdatePayload - Partial update description

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use shared::{RepositoryError, Result};

/// Field → new value overrides
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdatePayload {
    fields: BTreeMap<String, Value>,
}

impl UpdatePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: override one field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Build from any serializable struct or map, keeping only non-zero fields
    ///
    /// `null`, `""`, `0`, `false` and empty arrays/objects are skipped, so a
    /// struct with a single populated field overrides just that field.
    pub fn from_serializable<S: Serialize + ?Sized>(value: &S) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| RepositoryError::argument(format!("update payload: {}", e)))?;

        let Value::Object(map) = value else {
            return Err(RepositoryError::argument(
                "update payload must serialize to an object",
            ));
        };

        Ok(Self {
            fields: map.into_iter().filter(|(_, v)| !is_zero(v)).collect(),
        })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
