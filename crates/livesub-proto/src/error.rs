//! Protocol error types.

use thiserror::Error;

/// Error codes reported to clients in protocol error messages.
pub mod error_codes {
    /// The frame was not a JSON object (or not text at all).
    pub const INVALID_JSON: &str = "INVALID_JSON";
    /// A required field was absent or null.
    pub const MISSING_FIELD: &str = "MISSING_FIELD";
    /// A field was present but had an unusable value.
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
    /// The model label is not known to the server.
    pub const UNKNOWN_MODEL: &str = "UNKNOWN_MODEL";
    /// The session fell too far behind and is being closed.
    pub const MAILBOX_OVERFLOW: &str = "MAILBOX_OVERFLOW";
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A message was well-formed JSON but not a valid command.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] ProtocolError),
}

/// A client-visible protocol error.
///
/// Sent back on the originating connection only; it never closes the
/// connection (except for [`error_codes::MAILBOX_OVERFLOW`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    /// Stable error code from [`error_codes`].
    pub code: &'static str,
    /// Human readable description.
    pub message: String,
}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A frame that could not be parsed as a command object.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_JSON, message)
    }

    /// A required field is missing.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            error_codes::MISSING_FIELD,
            format!("missing required field `{}`", field),
        )
    }

    /// A field has an unusable value.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_VALUE, message)
    }

    /// The model label is not registered.
    pub fn unknown_model(model: &str) -> Self {
        Self::new(error_codes::UNKNOWN_MODEL, format!("unknown model `{}`", model))
    }

    /// The session's mailbox overflowed.
    pub fn mailbox_overflow(capacity: usize) -> Self {
        Self::new(
            error_codes::MAILBOX_OVERFLOW,
            format!("more than {} undelivered events, closing connection", capacity),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::missing_field("model");
        assert_eq!(err.code, error_codes::MISSING_FIELD);
        assert_eq!(err.to_string(), "MISSING_FIELD: missing required field `model`");
    }

    #[test]
    fn test_error_from_protocol_error() {
        let err: Error = ProtocolError::unknown_model("app.Nope").into();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }
}
