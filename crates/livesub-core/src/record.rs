//! Entity instances as dynamic records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// A snapshot of one entity instance: field name to JSON value.
///
/// For deletions the record is the image captured before removal, so it
/// stays fully serializable after the row is gone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::InvalidRecord(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// The whole record as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// A JSON object holding only the named fields that are present.
    pub fn project<S: AsRef<str>>(&self, fields: &[S]) -> Value {
        let projected = fields
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.fields
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        Value::Object(projected)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Record {
        Record::new()
            .with_field("id", 1)
            .with_field("text", "test")
            .with_field("done", false)
            .with_field("list_id", 7)
    }

    #[test]
    fn test_project() {
        assert_eq!(
            task().project(&["id", "text", "done", "missing"]),
            json!({"id": 1, "text": "test", "done": false})
        );
    }

    #[test]
    fn test_from_json() {
        let record = Record::from_json(json!({"id": 1, "list_id": null})).unwrap();
        assert_eq!(record.get("id"), Some(&json!(1)));
        assert_eq!(record.get("list_id"), Some(&Value::Null));
        assert_eq!(record.len(), 2);

        assert!(Record::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let encoded = serde_json::to_value(task()).unwrap();
        assert_eq!(encoded["list_id"], json!(7));
        let decoded: Record = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, task());
    }
}
