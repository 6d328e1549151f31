//! Model definitions and grouping-field accessors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::Record;

/// Reads a grouping key off an entity instance.
///
/// Returning `None` means the key is unavailable (for example a relation
/// that no longer exists); the translator then skips that axis.
pub trait FieldAccessor: Send + Sync {
    fn read(&self, record: &Record) -> Option<Value>;
}

impl<F> FieldAccessor for F
where
    F: Fn(&Record) -> Option<Value> + Send + Sync,
{
    fn read(&self, record: &Record) -> Option<Value> {
        self(record)
    }
}

/// A subscribable entity type.
#[derive(Clone)]
pub struct ModelDef {
    label: String,
    primary_key: String,
    accessors: HashMap<String, Arc<dyn FieldAccessor>>,
}

impl ModelDef {
    /// Create a model with the given label (e.g. `app.Task`) and primary key field.
    pub fn new(label: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            primary_key: primary_key.into(),
            accessors: HashMap::new(),
        }
    }

    /// Read `field` through a custom accessor instead of by name.
    pub fn with_accessor(
        mut self,
        field: impl Into<String>,
        accessor: impl FieldAccessor + 'static,
    ) -> Self {
        self.accessors.insert(field.into(), Arc::new(accessor));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Read a field value. `null` counts as unreadable.
    pub fn read_field(&self, field: &str, record: &Record) -> Option<Value> {
        let value = match self.accessors.get(field) {
            Some(accessor) => accessor.read(record),
            None => record.get(field).cloned(),
        };
        value.filter(|v| !v.is_null())
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accessors: Vec<&String> = self.accessors.keys().collect();
        accessors.sort();
        f.debug_struct("ModelDef")
            .field("label", &self.label)
            .field("primary_key", &self.primary_key)
            .field("accessors", &accessors)
            .finish()
    }
}
