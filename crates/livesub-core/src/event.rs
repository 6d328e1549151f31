//! Change events and broadcast group messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use livesub_proto::{Action, KeyValue};

use crate::record::Record;

/// Identifies a broadcast group: one key value along one grouping axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId {
    /// Model label.
    pub entity_type: String,
    /// Grouping field (the primary key field for per-instance groups).
    pub grouping_field: String,
    /// Canonical key value.
    pub key: KeyValue,
}

impl GroupId {
    pub fn new(
        entity_type: impl Into<String>,
        grouping_field: impl Into<String>,
        key: impl Into<KeyValue>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            grouping_field: grouping_field.into(),
            key: key.into(),
        }
    }

    /// Flat group name, suitable as a topic for an external fan-out backend.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RESOURCE-{}-{}-{}",
            self.entity_type, self.grouping_field, self.key
        )
    }
}

/// Canonical form of one lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Model label.
    pub entity_type: String,
    /// What happened.
    pub action: Action,
    /// The instance: after-image for creates and updates, before-image for deletes.
    pub instance: Record,
    /// Primary key value, when readable.
    pub primary_key: Option<Value>,
}

impl ChangeEvent {
    /// Pick the relevant image for `action`.
    ///
    /// Returns `None` when neither image was supplied.
    pub fn from_images(
        entity_type: impl Into<String>,
        action: Action,
        before: Option<&Record>,
        after: Option<&Record>,
    ) -> Option<Self> {
        let instance = match action {
            Action::Deleted => before.or(after),
            Action::Created | Action::Updated => after.or(before),
        }?;

        Some(Self {
            entity_type: entity_type.into(),
            action,
            instance: instance.clone(),
            primary_key: None,
        })
    }
}

/// What the translator publishes to one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    /// The group this message was published to.
    pub group: GroupId,
    /// What happened.
    pub action: Action,
    /// The instance snapshot.
    pub instance: Record,
    /// The grouping key exactly as read off the instance.
    pub key_value: Value,
}

impl GroupMessage {
    pub fn entity_type(&self) -> &str {
        &self.group.entity_type
    }

    pub fn grouping_field(&self) -> &str {
        &self.group.grouping_field
    }
}
