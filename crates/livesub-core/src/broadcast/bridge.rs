//! Cross-process fan-out.

use std::sync::Arc;

use tracing::trace;

use super::{GroupChannel, LocalChannel, SessionId};
use crate::event::{GroupId, GroupMessage};
use crate::mailbox::MailboxSender;

/// Backend that carries published messages to other server instances.
///
/// `forward` is called on the publishing path and must not block; a backend
/// that talks to a network should queue internally. On the receiving side the
/// backend hands messages to [`BridgedChannel::ingest_remote`].
pub trait RemoteFanout: Send + Sync {
    fn forward(&self, group: &GroupId, message: &GroupMessage);
}

/// A local channel whose publishes are also forwarded to a [`RemoteFanout`].
pub struct BridgedChannel<R> {
    local: LocalChannel,
    remote: R,
}

impl<R: RemoteFanout> BridgedChannel<R> {
    pub fn new(local: LocalChannel, remote: R) -> Self {
        Self { local, remote }
    }

    /// Deliver a message received from another instance to local members only.
    pub fn ingest_remote(&self, group: &GroupId, message: GroupMessage) -> usize {
        trace!(group = %group, "ingesting remote message");
        self.local.publish(group, Arc::new(message))
    }

    pub fn local(&self) -> &LocalChannel {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}

impl<R: RemoteFanout> GroupChannel for BridgedChannel<R> {
    fn attach(&self, session: SessionId, mailbox: MailboxSender) {
        self.local.attach(session, mailbox);
    }

    fn detach(&self, session: SessionId) {
        self.local.detach(session);
    }

    fn join(&self, group: &GroupId, session: SessionId) {
        self.local.join(group, session);
    }

    fn leave(&self, group: &GroupId, session: SessionId) {
        self.local.leave(group, session);
    }

    fn publish(&self, group: &GroupId, message: Arc<GroupMessage>) -> usize {
        self.remote.forward(group, &message);
        self.local.publish(group, message)
    }

    fn member_count(&self, group: &GroupId) -> usize {
        self.local.member_count(group)
    }

    fn group_count(&self) -> usize {
        self.local.group_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::mailbox::mailbox;
    use crate::record::Record;
    use livesub_proto::Action;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingFanout {
        forwarded: Mutex<Vec<String>>,
    }

    impl RemoteFanout for RecordingFanout {
        fn forward(&self, group: &GroupId, _message: &GroupMessage) {
            self.forwarded.lock().push(group.name());
        }
    }

    fn message(group: &GroupId) -> GroupMessage {
        GroupMessage {
            group: group.clone(),
            action: Action::Updated,
            instance: Record::new().with_field("id", 1),
            key_value: json!(1),
        }
    }

    #[test]
    fn test_publish_forwards_and_delivers() {
        let channel = BridgedChannel::new(LocalChannel::default(), RecordingFanout::default());
        let (tx, mut rx) = mailbox(8, OverflowPolicy::DropOldest);
        channel.attach(1, tx);

        let group = GroupId::new("app.Task", "id", 1);
        channel.join(&group, 1);

        assert_eq!(channel.publish(&group, Arc::new(message(&group))), 1);
        assert!(rx.try_recv().is_some());
        assert_eq!(
            *channel.remote().forwarded.lock(),
            vec!["RESOURCE-app.Task-id-1".to_string()]
        );
    }

    #[test]
    fn test_forwards_even_without_local_members() {
        let channel = BridgedChannel::new(LocalChannel::default(), RecordingFanout::default());
        let group = GroupId::new("app.Task", "id", 2);

        assert_eq!(channel.publish(&group, Arc::new(message(&group))), 0);
        assert_eq!(channel.remote().forwarded.lock().len(), 1);
    }

    #[test]
    fn test_ingest_remote_is_not_forwarded_again() {
        let channel = BridgedChannel::new(LocalChannel::default(), RecordingFanout::default());
        let (tx, mut rx) = mailbox(8, OverflowPolicy::DropOldest);
        channel.attach(1, tx);

        let group = GroupId::new("app.Task", "id", 1);
        channel.join(&group, 1);

        assert_eq!(channel.ingest_remote(&group, message(&group)), 1);
        assert!(rx.try_recv().is_some());
        assert!(channel.remote().forwarded.lock().is_empty());
        assert_eq!(channel.local().session_count(), 1);
    }
}
