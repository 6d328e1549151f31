//! Client commands and server messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ProtocolError};
use crate::key::KeyValue;

/// Lifecycle action that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// A new entity was created.
    Created,
    /// An existing entity was updated.
    Updated,
    /// An entity was deleted.
    Deleted,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "CREATED",
            Action::Updated => "UPDATED",
            Action::Deleted => "DELETED",
        }
    }
}

/// A raw frame sent by the client.
///
/// Fields are all optional at this level so that a missing field can be
/// reported with a precise error code instead of a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Model label, e.g. `app.Task`.
    #[serde(default)]
    pub model: Option<String>,
    /// Grouping field; the model's primary key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Primary key or grouping key value.
    #[serde(default)]
    pub value: Option<Value>,
    /// Leave the group instead of joining it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unsubscribe: bool,
}

/// A validated subscribe or unsubscribe target.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    /// Model label.
    pub model: String,
    /// Grouping field, `None` meaning the primary key.
    pub property: Option<String>,
    /// Canonical group key.
    pub key: KeyValue,
}

/// A validated client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Join a group.
    Subscribe(SubscribeRequest),
    /// Leave a group.
    Unsubscribe(SubscribeRequest),
}

impl ClientMessage {
    /// Create a subscribe message for a primary key.
    pub fn subscribe(model: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            model: Some(model.into()),
            property: None,
            value: Some(value.into()),
            unsubscribe: false,
        }
    }

    /// Use a grouping field instead of the primary key.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// Turn this message into an unsubscribe.
    pub fn into_unsubscribe(mut self) -> Self {
        self.unsubscribe = true;
        self
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::invalid_json(e.to_string()))
    }

    /// Validate the frame into a command.
    pub fn into_command(self) -> Result<Command, ProtocolError> {
        let model = match self.model {
            Some(m) if !m.is_empty() => m,
            _ => return Err(ProtocolError::missing_field("model")),
        };

        let value = self.value.ok_or_else(|| ProtocolError::missing_field("value"))?;
        let key = KeyValue::from_json(&value).ok_or_else(|| {
            ProtocolError::invalid_value(format!("`value` must be a string, number or boolean, got {}", value))
        })?;

        let property = self.property.filter(|p| !p.is_empty());
        let request = SubscribeRequest {
            model,
            property,
            key,
        };

        Ok(if self.unsubscribe {
            Command::Unsubscribe(request)
        } else {
            Command::Subscribe(request)
        })
    }
}

/// A change notification pushed to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Model label of the changed entity.
    pub model: String,
    /// Serialized entity, as produced by the subscription's serializer.
    pub instance: Value,
    /// What happened to the entity.
    pub action: Action,
    /// The group key value this notification was routed by.
    pub group_key_value: Value,
}

/// Body of a protocol error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: String,
    /// Human readable description.
    pub message: String,
}

/// A message from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Change notification.
    Notification(Notification),
    /// Protocol error; the connection stays open.
    Error {
        /// Error details.
        error: ErrorBody,
    },
}

impl ServerMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Whether this is a protocol error.
    pub fn is_error(&self) -> bool {
        matches!(self, ServerMessage::Error { .. })
    }
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        ServerMessage::Notification(notification)
    }
}

impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        ServerMessage::Error {
            error: ErrorBody {
                code: err.code.to_string(),
                message: err.message,
            },
        }
    }
}
