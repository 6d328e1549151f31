//! Connection identities.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The principal bound to a connection by the authentication layer.
///
/// The broker never interprets it; it is handed unchanged to every
/// permission check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Identity {
    /// No credentials were presented.
    #[default]
    Anonymous,
    /// An authenticated principal.
    User(Principal),
}

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject identifier (user id, service name).
    pub subject: String,
    /// Extra attributes supplied by the authenticator.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Identity {
    /// An authenticated identity with no attributes.
    pub fn user(subject: impl Into<String>) -> Self {
        Identity::User(Principal {
            subject: subject.into(),
            attributes: HashMap::new(),
        })
    }

    /// Attach an attribute to an authenticated identity. No-op for anonymous.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Identity::User(ref mut principal) = self {
            principal.attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Whether credentials were presented and accepted.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    /// Subject of an authenticated identity.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Identity::User(principal) => Some(&principal.subject),
            Identity::Anonymous => None,
        }
    }

    /// Look up an attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self {
            Identity::User(principal) => principal.attributes.get(name),
            Identity::Anonymous => None,
        }
    }
}
