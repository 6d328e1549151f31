//! Lifecycle notifications to broadcast groups.
//!
//! The translator is called by the persistence layer right after a create,
//! update or delete has committed. It never fails towards its caller: an axis
//! whose key cannot be read is skipped and logged, and the remaining axes are
//! still dispatched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use livesub_proto::{Action, KeyValue};

use crate::broadcast::GroupChannel;
use crate::cdc::LifecycleNotification;
use crate::event::{ChangeEvent, GroupId, GroupMessage};
use crate::metrics::SharedMetrics;
use crate::record::Record;
use crate::registry::Registry;

/// A grouping axis that could not be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAxis {
    pub grouping_field: String,
    pub reason: String,
}

/// Outcome of translating one lifecycle notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Groups published to.
    pub groups: usize,
    /// Mailboxes that accepted a message, summed over all groups.
    pub recipients: usize,
    /// Axes that were skipped.
    pub skipped: Vec<SkippedAxis>,
}

/// Bridges persistence-layer lifecycle notifications into group publishes.
pub struct ChangeTranslator {
    registry: Arc<Registry>,
    channel: Arc<dyn GroupChannel>,
    metrics: SharedMetrics,
}

impl ChangeTranslator {
    pub fn new(registry: Arc<Registry>, channel: Arc<dyn GroupChannel>, metrics: SharedMetrics) -> Self {
        Self {
            registry,
            channel,
            metrics,
        }
    }

    /// Handle a committed create, update or delete.
    ///
    /// `before` is the image prior to the change and `after` the image
    /// following it; deletes are dispatched with the before-image.
    pub fn on_entity_changed(
        &self,
        entity_type: &str,
        before: Option<&Record>,
        after: Option<&Record>,
        action: Action,
    ) -> DispatchReport {
        self.metrics.record_event();

        if !self.registry.has_model(entity_type) {
            trace!(model = entity_type, "model is not subscribable");
            return DispatchReport::default();
        }

        let Some(mut event) = ChangeEvent::from_images(entity_type, action, before, after) else {
            warn!(model = entity_type, action = action.as_str(), "lifecycle notification carried no instance");
            return DispatchReport::default();
        };

        event.primary_key = self
            .registry
            .primary_key(entity_type)
            .and_then(|pk| self.read_key(entity_type, pk, &event.instance));

        self.dispatch(&event)
    }

    /// Handle a queued lifecycle notification.
    pub fn apply(&self, notification: &LifecycleNotification) -> DispatchReport {
        self.on_entity_changed(
            &notification.entity_type,
            notification.before.as_ref(),
            notification.after.as_ref(),
            notification.action,
        )
    }

    /// Publish `event` on every registered grouping axis of its model.
    pub fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for field in self.registry.grouping_fields(&event.entity_type) {
            let key_value = self.read_key(&event.entity_type, field, &event.instance);
            let Some((key, key_value)) =
                key_value.and_then(|raw| KeyValue::from_json(&raw).map(|key| (key, raw)))
            else {
                warn!(
                    model = %event.entity_type,
                    grouping_field = field,
                    action = event.action.as_str(),
                    "grouping key unreadable, skipping axis"
                );
                self.metrics.record_axis_skipped();
                report.skipped.push(SkippedAxis {
                    grouping_field: field.to_string(),
                    reason: "grouping key is missing, null or not a scalar".to_string(),
                });
                continue;
            };

            let group = GroupId::new(event.entity_type.clone(), field, key);
            let message = Arc::new(GroupMessage {
                group: group.clone(),
                action: event.action,
                instance: event.instance.clone(),
                key_value,
            });

            let recipients = self.channel.publish(&group, message);
            self.metrics.record_dispatch();
            report.groups += 1;
            report.recipients += recipients;
        }

        debug!(
            model = %event.entity_type,
            action = event.action.as_str(),
            primary_key = ?event.primary_key,
            groups = report.groups,
            recipients = report.recipients,
            skipped = report.skipped.len(),
            "dispatched change event"
        );
        report
    }

    fn read_key(&self, entity_type: &str, field: &str, instance: &Record) -> Option<serde_json::Value> {
        self.registry
            .model(entity_type)
            .and_then(|model| model.read_field(field, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::LocalChannel;
    use crate::config::OverflowPolicy;
    use crate::mailbox::{mailbox, MailboxReceiver};
    use crate::metrics::BrokerMetrics;
    use crate::registry::{FullRecord, ModelDef, SubscriptionConfig};
    use serde_json::json;

    struct Fixture {
        translator: ChangeTranslator,
        channel: Arc<LocalChannel>,
        metrics: SharedMetrics,
    }

    fn fixture() -> Fixture {
        let registry = Registry::builder()
            .model(ModelDef::new("app.Task", "id"))
            .register(SubscriptionConfig::new("app.Task", FullRecord))
            .register(SubscriptionConfig::new("app.Task", FullRecord).group_by("list_id"))
            .build();
        let metrics = Arc::new(BrokerMetrics::new());
        let channel = Arc::new(LocalChannel::new(metrics.clone()));
        Fixture {
            translator: ChangeTranslator::new(Arc::new(registry), channel.clone(), metrics.clone()),
            channel,
            metrics,
        }
    }

    fn member(channel: &LocalChannel, session: u64, group: &GroupId) -> MailboxReceiver {
        let (tx, rx) = mailbox(8, OverflowPolicy::DropOldest);
        channel.attach(session, tx);
        channel.join(group, session);
        rx
    }

    fn task(list_id: serde_json::Value) -> Record {
        Record::new()
            .with_field("id", 1)
            .with_field("text", "test")
            .with_field("done", false)
            .with_field("list_id", list_id)
    }

    #[test]
    fn test_created_reaches_both_axes() {
        let fx = fixture();
        let mut by_id = member(&fx.channel, 1, &GroupId::new("app.Task", "id", 1));
        let mut by_list = member(&fx.channel, 2, &GroupId::new("app.Task", "list_id", 7));
        let mut other_list = member(&fx.channel, 3, &GroupId::new("app.Task", "list_id", 8));

        let report =
            fx.translator
                .on_entity_changed("app.Task", None, Some(&task(json!(7))), Action::Created);

        assert_eq!(report.groups, 2);
        assert_eq!(report.recipients, 2);
        assert!(report.skipped.is_empty());

        let message = by_id.try_recv().unwrap();
        assert_eq!(message.action, Action::Created);
        assert_eq!(message.key_value, json!(1));
        assert_eq!(by_list.try_recv().unwrap().key_value, json!(7));
        assert!(other_list.try_recv().is_none());
    }

    #[test]
    fn test_deleted_uses_before_image() {
        let fx = fixture();
        let mut by_id = member(&fx.channel, 1, &GroupId::new("app.Task", "id", 1));

        fx.translator
            .on_entity_changed("app.Task", Some(&task(json!(7))), None, Action::Deleted);

        let message = by_id.try_recv().unwrap();
        assert_eq!(message.action, Action::Deleted);
        assert_eq!(message.instance, task(json!(7)));
    }

    #[test]
    fn test_null_grouping_field_skips_only_that_axis() {
        let fx = fixture();
        let mut by_id = member(&fx.channel, 1, &GroupId::new("app.Task", "id", 1));

        let report = fx.translator.on_entity_changed(
            "app.Task",
            None,
            Some(&task(serde_json::Value::Null)),
            Action::Updated,
        );

        assert_eq!(report.groups, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].grouping_field, "list_id");
        assert!(by_id.try_recv().is_some());
        assert_eq!(fx.metrics.snapshot().axes_skipped, 1);
    }

    #[test]
    fn test_unknown_model_is_ignored() {
        let fx = fixture();
        let record = Record::new().with_field("id", 1);
        let report = fx
            .translator
            .on_entity_changed("app.Other", None, Some(&record), Action::Created);

        assert_eq!(report, DispatchReport::default());
        assert_eq!(fx.metrics.snapshot().events_received, 1);
    }

    #[test]
    fn test_missing_images() {
        let fx = fixture();
        let report = fx
            .translator
            .on_entity_changed("app.Task", None, None, Action::Updated);
        assert_eq!(report.groups, 0);
    }

    #[test]
    fn test_no_members_is_not_an_error() {
        let fx = fixture();
        let report =
            fx.translator
                .on_entity_changed("app.Task", None, Some(&task(json!(7))), Action::Created);

        assert_eq!(report.groups, 2);
        assert_eq!(report.recipients, 0);
        assert_eq!(fx.metrics.snapshot().dispatches, 2);
    }

    #[test]
    fn test_apply_notification() {
        let fx = fixture();
        let mut by_list = member(&fx.channel, 1, &GroupId::new("app.Task", "list_id", "7"));

        let report = fx
            .translator
            .apply(&LifecycleNotification::created("app.Task", task(json!(7))));

        assert_eq!(report.recipients, 1);
        assert!(by_list.try_recv().is_some());
    }
}
