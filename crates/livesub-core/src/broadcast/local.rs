//! In-process group channel.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{trace, warn};

use super::{GroupChannel, SessionId};
use crate::event::{GroupId, GroupMessage};
use crate::mailbox::{MailboxSender, PushOutcome};
use crate::metrics::{BrokerMetrics, SharedMetrics};

/// Group channel for the sessions of this process.
///
/// Group member sets live in a sharded map; membership changes take the
/// shard's write lock and publishes hold its read lock while pushing into
/// mailboxes, which never blocks.
pub struct LocalChannel {
    mailboxes: DashMap<SessionId, MailboxSender>,
    groups: DashMap<GroupId, HashSet<SessionId>>,
    metrics: SharedMetrics,
}

impl LocalChannel {
    pub fn new(metrics: SharedMetrics) -> Self {
        Self {
            mailboxes: DashMap::new(),
            groups: DashMap::new(),
            metrics,
        }
    }

    /// Number of attached sessions.
    pub fn session_count(&self) -> usize {
        self.mailboxes.len()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(Arc::new(BrokerMetrics::new()))
    }
}

impl GroupChannel for LocalChannel {
    fn attach(&self, session: SessionId, mailbox: MailboxSender) {
        self.mailboxes.insert(session, mailbox);
    }

    fn detach(&self, session: SessionId) {
        if let Some((_, mailbox)) = self.mailboxes.remove(&session) {
            mailbox.close();
        }
    }

    fn join(&self, group: &GroupId, session: SessionId) {
        self.groups.entry(group.clone()).or_default().insert(session);
        trace!(group = %group, session, "joined group");
    }

    fn leave(&self, group: &GroupId, session: SessionId) {
        let now_empty = match self.groups.get_mut(group) {
            Some(mut members) => {
                members.remove(&session);
                members.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.groups.remove_if(group, |_, members| members.is_empty());
        }
        trace!(group = %group, session, "left group");
    }

    fn publish(&self, group: &GroupId, message: Arc<GroupMessage>) -> usize {
        let Some(members) = self.groups.get(group) else {
            trace!(group = %group, "no members, nothing to publish");
            return 0;
        };

        let mut accepted = 0;
        for session in members.iter() {
            let Some(mailbox) = self.mailboxes.get(session) else {
                continue;
            };

            match mailbox.push(message.clone()) {
                PushOutcome::Queued => accepted += 1,
                PushOutcome::DroppedOldest => {
                    accepted += 1;
                    self.metrics.record_dropped();
                    warn!(session = *session, group = %group, "mailbox full, dropped oldest event");
                }
                PushOutcome::Overflowed => {
                    self.metrics.record_overflow_disconnect();
                    warn!(session = *session, group = %group, "mailbox overflowed, disconnecting session");
                }
                PushOutcome::Closed => {}
            }
        }

        trace!(group = %group, recipients = accepted, "published to group");
        accepted
    }

    fn member_count(&self, group: &GroupId) -> usize {
        self.groups.get(group).map(|members| members.len()).unwrap_or(0)
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }
}
