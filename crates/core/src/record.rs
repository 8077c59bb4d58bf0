use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::FieldValue;

/// One row of incoming data, in source key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    entries: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.entries.push((key.to_string(), value.into()));
    }

    pub fn entries(&self) -> &[(String, FieldValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw lookup. A key written twice resolves to the later entry.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Lookup that treats an explicit null the same as a missing key.
    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        self.get(key).filter(|v| !v.is_null())
    }

    /// Whether `field` holds a usable identifier: present, non-null and
    /// non-empty once rendered.
    pub fn has_identifier(&self, field: &str) -> bool {
        self.value(field)
            .is_some_and(|v| !v.to_display_string().is_empty())
    }

    /// The string this record is keyed by in the document. Records without a
    /// usable identifier fall back to their position so they are still
    /// processed; such placeholders never match an earlier pass.
    pub fn identifier(&self, field: &str, index: usize) -> String {
        match self.value(field).map(FieldValue::to_display_string) {
            Some(id) if !id.is_empty() => id,
            _ => format!("row-{index}"),
        }
    }

    pub fn from_json_object(value: &serde_json::Value) -> Result<Self, CoreError> {
        let object = value
            .as_object()
            .ok_or_else(|| CoreError::InvalidData(format!("record must be a JSON object, got {value}")))?;
        let entries = object
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect();
        Ok(Self { entries })
    }

    /// Parses a JSON array of objects into records.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, CoreError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let rows = value
            .as_array()
            .ok_or_else(|| CoreError::InvalidData("records must be a JSON array".into()))?;
        rows.iter().map(Self::from_json_object).collect()
    }
}
