//! Queue-based change ingestion.
//!
//! Persistence layers that would rather not call the translator inline can
//! push [`LifecycleNotification`]s into a bounded channel; a background
//! [`CdcProcessor`] drains it and hands each notification to the
//! [`ChangeTranslator`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use livesub_proto::Action;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::translator::ChangeTranslator;

/// One committed create, update or delete as reported by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleNotification {
    /// Model label.
    pub entity_type: String,
    /// What happened.
    pub action: Action,
    /// Image before the change (required for deletes).
    #[serde(default)]
    pub before: Option<Record>,
    /// Image after the change (required for creates and updates).
    #[serde(default)]
    pub after: Option<Record>,
}

impl LifecycleNotification {
    pub fn created(entity_type: impl Into<String>, after: Record) -> Self {
        Self {
            entity_type: entity_type.into(),
            action: Action::Created,
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(entity_type: impl Into<String>, before: Option<Record>, after: Record) -> Self {
        Self {
            entity_type: entity_type.into(),
            action: Action::Updated,
            before,
            after: Some(after),
        }
    }

    pub fn deleted(entity_type: impl Into<String>, before: Record) -> Self {
        Self {
            entity_type: entity_type.into(),
            action: Action::Deleted,
            before: Some(before),
            after: None,
        }
    }
}

/// Background task feeding queued notifications to the translator.
pub struct CdcProcessor {
    rx: mpsc::Receiver<LifecycleNotification>,
    translator: Arc<ChangeTranslator>,
}

impl CdcProcessor {
    pub fn new(rx: mpsc::Receiver<LifecycleNotification>, translator: Arc<ChangeTranslator>) -> Self {
        Self { rx, translator }
    }

    /// Process notifications until every sender is dropped.
    pub async fn run(mut self) {
        info!("CDC processor started");

        while let Some(notification) = self.rx.recv().await {
            debug!(
                model = %notification.entity_type,
                action = notification.action.as_str(),
                "processing queued change"
            );
            self.translator.apply(&notification);
        }

        info!("CDC processor stopped (channel closed)");
    }
}

/// CDC channel sender.
pub type CdcSender = mpsc::Sender<LifecycleNotification>;

/// CDC channel receiver.
pub type CdcReceiver = mpsc::Receiver<LifecycleNotification>;

/// Create a CDC channel with the given buffer size.
pub fn channel(buffer_size: usize) -> (CdcSender, CdcReceiver) {
    mpsc::channel(buffer_size.max(1))
}

/// Handle for submitting notifications to a running processor.
#[derive(Clone)]
pub struct CdcHandle {
    tx: CdcSender,
}

impl CdcHandle {
    pub fn new(tx: CdcSender) -> Self {
        Self { tx }
    }

    /// Submit without waiting; fails when the queue is full.
    pub fn try_send(&self, notification: LifecycleNotification) -> Result<()> {
        self.tx.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => Error::QueueClosed,
        })
    }

    /// Submit, waiting for queue space.
    pub async fn send(&self, notification: LifecycleNotification) -> Result<()> {
        self.tx.send(notification).await.map_err(|_| Error::QueueClosed)
    }

    /// Free slots in the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Spawn a CDC processor and return a handle to it.
pub fn start_processor(translator: Arc<ChangeTranslator>, buffer_size: usize) -> CdcHandle {
    let (tx, rx) = channel(buffer_size);
    let processor = CdcProcessor::new(rx, translator);

    tokio::spawn(async move {
        processor.run().await;
    });

    CdcHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{GroupChannel, LocalChannel};
    use crate::config::OverflowPolicy;
    use crate::event::GroupId;
    use crate::mailbox::mailbox;
    use crate::metrics::BrokerMetrics;
    use crate::registry::{FullRecord, ModelDef, Registry, SubscriptionConfig};
    use std::time::Duration;

    fn translator() -> (Arc<ChangeTranslator>, Arc<LocalChannel>) {
        let registry = Registry::builder()
            .model(ModelDef::new("app.Task", "id"))
            .register(SubscriptionConfig::new("app.Task", FullRecord))
            .build();
        let metrics = Arc::new(BrokerMetrics::new());
        let channel = Arc::new(LocalChannel::new(metrics.clone()));
        (
            Arc::new(ChangeTranslator::new(Arc::new(registry), channel.clone(), metrics)),
            channel,
        )
    }

    #[tokio::test]
    async fn test_processor_dispatches_queued_changes() {
        let (translator, channel) = translator();
        let (tx, mut rx) = mailbox(8, OverflowPolicy::DropOldest);
        channel.attach(1, tx);
        channel.join(&GroupId::new("app.Task", "id", 1), 1);

        let handle = start_processor(translator, 16);
        handle
            .send(LifecycleNotification::created(
                "app.Task",
                Record::new().with_field("id", 1),
            ))
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.action, Action::Created);
    }

    #[tokio::test]
    async fn test_processor_stops_when_senders_drop() {
        let (translator, _channel) = translator();
        let (tx, rx) = channel(4);
        let task = tokio::spawn(CdcProcessor::new(rx, translator).run());

        tx.send(LifecycleNotification::deleted("app.Task", Record::new().with_field("id", 1)))
            .await
            .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_try_send_full_queue() {
        let (tx, _rx) = channel(1);
        let handle = CdcHandle::new(tx);
        let record = Record::new().with_field("id", 1);

        handle
            .try_send(LifecycleNotification::created("app.Task", record.clone()))
            .unwrap();
        let err = handle
            .try_send(LifecycleNotification::created("app.Task", record))
            .unwrap_err();
        assert!(matches!(err, Error::QueueFull));
    }

    #[tokio::test]
    async fn test_try_send_closed_queue() {
        let (tx, rx) = channel(1);
        drop(rx);
        let handle = CdcHandle::new(tx);

        let err = handle
            .try_send(LifecycleNotification::deleted("app.Task", Record::new()))
            .unwrap_err();
        assert!(matches!(err, Error::QueueClosed));
    }

    #[test]
    fn test_notification_json() {
        let notification: LifecycleNotification = serde_json::from_str(
            r#"{"entity_type": "app.Task", "action": "UPDATED", "after": {"id": 1, "done": true}}"#,
        )
        .unwrap();
        assert_eq!(notification.action, Action::Updated);
        assert!(notification.before.is_none());
        assert_eq!(notification.after.unwrap().len(), 2);
    }
}
