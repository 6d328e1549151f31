//! livesub protocol types.
//!
//! This crate defines the JSON messages exchanged over a live subscription
//! connection: one JSON object per frame, in both directions.
//!
//! # Modules
//!
//! - [`message`] - Client commands and server messages
//! - [`key`] - Group key values and their canonical form
//! - [`error`] - Protocol error types and client-visible error codes
//!
//! # Example
//!
//! ```
//! use livesub_proto::{ClientMessage, Command};
//!
//! let msg: ClientMessage =
//!     serde_json::from_str(r#"{"model": "app.Task", "property": "list_id", "value": 7}"#).unwrap();
//! let command = msg.into_command().unwrap();
//! assert!(matches!(command, Command::Subscribe(_)));
//! ```

pub mod error;
pub mod key;
pub mod message;

pub use error::{error_codes, Error, ProtocolError};
pub use key::KeyValue;
pub use message::{
    Action, ClientMessage, Command, ErrorBody, Notification, ServerMessage, SubscribeRequest,
};

/// Protocol version for wire compatibility.
///
/// Reported by the server's health endpoint. Incremented whenever the
/// message shapes change in incompatible ways.
pub const PROTOCOL_VERSION: u32 = 1;
