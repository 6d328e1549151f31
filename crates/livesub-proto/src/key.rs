//! Group key values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The key component of a broadcast group, in canonical text form.
///
/// Keys are compared by their text, so the integer `1` and the string `"1"`
/// address the same group. Only scalar JSON values can be keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValue(String);

impl KeyValue {
    /// Derive a key from a JSON value.
    ///
    /// Returns `None` for `null`, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// The canonical text of this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for KeyValue {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<i32> for KeyValue {
    fn from(n: i32) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for KeyValue {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
