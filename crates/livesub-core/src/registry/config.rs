//! Subscription configurations: serializer plus permission predicate.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::identity::Identity;
use crate::record::Record;

/// Turns an entity instance into the payload sent to subscribers.
///
/// Implementations must be pure; the broker never inspects the result.
pub trait Serializer: Send + Sync {
    fn serialize(&self, record: &Record) -> Value;
}

impl<F> Serializer for F
where
    F: Fn(&Record) -> Value + Send + Sync,
{
    fn serialize(&self, record: &Record) -> Value {
        self(record)
    }
}

/// Serializes every field of the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullRecord;

impl Serializer for FullRecord {
    fn serialize(&self, record: &Record) -> Value {
        record.to_json()
    }
}

/// Serializes a fixed list of fields.
#[derive(Debug, Clone)]
pub struct FieldProjection {
    fields: Vec<String>,
}

impl FieldProjection {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Serializer for FieldProjection {
    fn serialize(&self, record: &Record) -> Value {
        record.project(&self.fields)
    }
}

/// Decides whether an identity may see an entity instance.
pub trait PermissionCheck: Send + Sync {
    fn check(&self, identity: &Identity, record: &Record) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(&Identity, &Record) -> bool + Send + Sync,
{
    fn check(&self, identity: &Identity, record: &Record) -> bool {
        self(identity, record)
    }
}

/// The default permission check: everyone may see everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn check(&self, _identity: &Identity, _record: &Record) -> bool {
        true
    }
}

/// One way of publishing an entity type along one grouping axis.
///
/// Several configs may share the same entity type and grouping field; each is
/// evaluated on its own, so one event can produce several notifications for
/// the same subscriber.
#[derive(Clone)]
pub struct SubscriptionConfig {
    entity_type: String,
    grouping_field: Option<String>,
    serializer: Arc<dyn Serializer>,
    permission: Arc<dyn PermissionCheck>,
}

impl SubscriptionConfig {
    /// Create a config grouped by the model's primary key, visible to everyone.
    pub fn new(entity_type: impl Into<String>, serializer: impl Serializer + 'static) -> Self {
        Self {
            entity_type: entity_type.into(),
            grouping_field: None,
            serializer: Arc::new(serializer),
            permission: Arc::new(AllowAll),
        }
    }

    /// Group by another field instead of the primary key.
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.grouping_field = Some(field.into());
        self
    }

    /// Restrict delivery with a permission check.
    pub fn with_permission(mut self, permission: impl PermissionCheck + 'static) -> Self {
        self.permission = Arc::new(permission);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The explicit grouping field; `None` means the primary key.
    pub fn grouping_field(&self) -> Option<&str> {
        self.grouping_field.as_deref()
    }

    pub fn serialize(&self, record: &Record) -> Value {
        self.serializer.serialize(record)
    }

    pub fn permits(&self, identity: &Identity, record: &Record) -> bool {
        self.permission.check(identity, record)
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("entity_type", &self.entity_type)
            .field("grouping_field", &self.grouping_field)
            .finish_non_exhaustive()
    }
}
