//! Model schema files.
//!
//! The server learns which models are subscribable from a JSON file:
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "label": "app.Task",
//!       "primary_key": "id",
//!       "subscriptions": [
//!         { "fields": ["id", "text", "done"] },
//!         { "group_by": "list_id", "permission": "authenticated" },
//!         { "group_by": "list_id", "permission": { "owner": { "field": "owner_id" } } }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A subscription without `group_by` groups by the primary key; one without
//! `fields` sends the full instance.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use livesub_core::proto::KeyValue;
use livesub_core::registry::DEFAULT_PRIMARY_KEY;
use livesub_core::{
    FieldProjection, FullRecord, Identity, ModelDef, PermissionCheck, Record, Registry,
    SubscriptionConfig,
};

use crate::error::{Error, Result};

/// Root of a schema file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub models: Vec<ModelSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub label: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSchema {
    /// Grouping field; the primary key when absent.
    #[serde(default)]
    pub group_by: Option<String>,
    /// Projected fields; the full instance when absent.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub permission: PermissionPolicy,
}

/// Declarative permission checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Everyone.
    #[default]
    Any,
    /// Authenticated connections only.
    Authenticated,
    /// Anonymous connections only.
    Anonymous,
    /// Connections whose subject equals the instance's `field`.
    Owner { field: String },
}

impl PermissionCheck for PermissionPolicy {
    fn check(&self, identity: &Identity, record: &Record) -> bool {
        match self {
            PermissionPolicy::Any => true,
            PermissionPolicy::Authenticated => identity.is_authenticated(),
            PermissionPolicy::Anonymous => !identity.is_authenticated(),
            PermissionPolicy::Owner { field } => {
                let owner = record.get(field).and_then(KeyValue::from_json);
                match (identity.subject(), owner) {
                    (Some(subject), Some(owner)) => owner.as_str() == subject,
                    _ => false,
                }
            }
        }
    }
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Schema(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Schema(format!("{}: {}", path.display(), e)))
    }

    /// Build the registry this schema describes.
    pub fn into_registry(self) -> Result<Registry> {
        let mut builder = Registry::builder();

        for model in self.models {
            if model.label.is_empty() {
                return Err(Error::Schema("model label must not be empty".to_string()));
            }
            builder.add_model(ModelDef::new(model.label.clone(), model.primary_key));

            for subscription in model.subscriptions {
                let config = match subscription.fields {
                    Some(fields) => {
                        SubscriptionConfig::new(model.label.clone(), FieldProjection::new(fields))
                    }
                    None => SubscriptionConfig::new(model.label.clone(), FullRecord),
                };
                let config = match subscription.group_by {
                    Some(field) => config.group_by(field),
                    None => config,
                };
                builder.add(config.with_permission(subscription.permission));
            }
        }

        Ok(builder.build())
    }
}

/// Load the registry from `path`.
///
/// No path, or a path that does not exist, yields an empty registry.
pub fn load_registry(path: Option<&Path>) -> Result<Registry> {
    let Some(path) = path else {
        warn!("no schema file configured, no models are subscribable");
        return Ok(Registry::empty());
    };

    if !path.exists() {
        warn!(path = %path.display(), "schema file not found, no models are subscribable");
        return Ok(Registry::empty());
    }

    let registry = Schema::load(path)?.into_registry()?;
    info!(
        path = %path.display(),
        models = registry.model_labels().count(),
        subscriptions = registry.config_count(),
        "loaded schema"
    );
    Ok(registry)
}
