//! Registry of subscribable models.
//!
//! The registry is filled once at startup through a [`RegistryBuilder`] and is
//! read-only afterwards, so it can be shared behind an `Arc` and read without
//! locking. Lookups for pairs that were never registered return an empty
//! slice; such axes simply never notify anyone.

mod config;
mod model;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use config::{
    AllowAll, FieldProjection, FullRecord, PermissionCheck, Serializer, SubscriptionConfig,
};
pub use model::{FieldAccessor, ModelDef};

/// Primary key assumed for models that were never defined explicitly.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// All configs registered for one grouping field of a model.
#[derive(Debug)]
struct Axis {
    field: String,
    configs: Vec<Arc<SubscriptionConfig>>,
}

/// Startup-time registry builder.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    models: HashMap<String, ModelDef>,
    pending: Vec<SubscriptionConfig>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a model. A later definition with the same label replaces the earlier one.
    pub fn model(mut self, model: ModelDef) -> Self {
        self.add_model(model);
        self
    }

    /// Register a subscription config.
    pub fn register(mut self, config: SubscriptionConfig) -> Self {
        self.add(config);
        self
    }

    pub fn add_model(&mut self, model: ModelDef) {
        self.models.insert(model.label().to_string(), model);
    }

    pub fn add(&mut self, config: SubscriptionConfig) {
        self.pending.push(config);
    }

    /// Freeze the registry.
    pub fn build(self) -> Registry {
        let mut models = self.models;
        let mut axes: HashMap<String, Vec<Axis>> = HashMap::new();

        for config in self.pending {
            let model = models
                .entry(config.entity_type().to_string())
                .or_insert_with(|| {
                    warn!(
                        model = %config.entity_type(),
                        primary_key = DEFAULT_PRIMARY_KEY,
                        "subscription registered for undefined model, assuming default primary key"
                    );
                    ModelDef::new(config.entity_type(), DEFAULT_PRIMARY_KEY)
                });

            let field = config
                .grouping_field()
                .unwrap_or(model.primary_key())
                .to_string();

            let model_axes = axes.entry(model.label().to_string()).or_default();
            match model_axes.iter_mut().find(|axis| axis.field == field) {
                Some(axis) => axis.configs.push(Arc::new(config)),
                None => model_axes.push(Axis {
                    field,
                    configs: vec![Arc::new(config)],
                }),
            }
        }

        // The primary-key axis is dispatched first.
        for (label, model_axes) in axes.iter_mut() {
            if let Some(model) = models.get(label) {
                let pk = model.primary_key();
                model_axes.sort_by_key(|axis| axis.field != pk);
            }
        }

        for (label, model) in &models {
            match axes.get(label) {
                Some(model_axes) => {
                    for axis in model_axes {
                        info!(
                            model = %label,
                            grouping_field = %axis.field,
                            configs = axis.configs.len(),
                            "registered subscription axis"
                        );
                    }
                }
                None => debug!(
                    model = %label,
                    primary_key = %model.primary_key(),
                    "model has no subscriptions, its changes will not be broadcast"
                ),
            }
        }

        Registry { models, axes }
    }
}

/// Read-only table of models and their subscription configs.
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, ModelDef>,
    axes: HashMap<String, Vec<Axis>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Configs for one axis, in registration order. Empty when unregistered.
    pub fn lookup(&self, entity_type: &str, grouping_field: &str) -> &[Arc<SubscriptionConfig>] {
        self.axes
            .get(entity_type)
            .and_then(|axes| axes.iter().find(|axis| axis.field == grouping_field))
            .map(|axis| axis.configs.as_slice())
            .unwrap_or(&[])
    }

    pub fn model(&self, entity_type: &str) -> Option<&ModelDef> {
        self.models.get(entity_type)
    }

    pub fn has_model(&self, entity_type: &str) -> bool {
        self.models.contains_key(entity_type)
    }

    pub fn primary_key(&self, entity_type: &str) -> Option<&str> {
        self.models.get(entity_type).map(|model| model.primary_key())
    }

    /// Grouping fields with at least one config, primary key first.
    pub fn grouping_fields<'a>(&'a self, entity_type: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.axes
            .get(entity_type)
            .into_iter()
            .flat_map(|axes| axes.iter().map(|axis| axis.field.as_str()))
    }

    /// Labels of all defined models.
    pub fn model_labels(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Total number of registered configs.
    pub fn config_count(&self) -> usize {
        self.axes
            .values()
            .flat_map(|axes| axes.iter())
            .map(|axis| axis.configs.len())
            .sum()
    }
}
