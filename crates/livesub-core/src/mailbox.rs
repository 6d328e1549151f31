//! Bounded per-session mailbox.
//!
//! Publishers push into a session's mailbox without ever waiting; when the
//! mailbox is full the configured [`OverflowPolicy`] decides whether the
//! oldest event is discarded or the mailbox is closed (which ends the
//! session).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::OverflowPolicy;
use crate::event::GroupMessage;

/// Result of pushing into a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The message was queued.
    Queued,
    /// The message was queued after discarding the oldest one.
    DroppedOldest,
    /// The mailbox was full and has been closed.
    Overflowed,
    /// The mailbox was already closed; the message was discarded.
    Closed,
}

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<Arc<GroupMessage>>,
    closed: bool,
    overflowed: bool,
    dropped: u64,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

/// Create a mailbox.
pub fn mailbox(capacity: usize, policy: OverflowPolicy) -> (MailboxSender, MailboxReceiver) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner::default()),
        notify: Notify::new(),
        capacity: capacity.max(1),
        policy,
    });

    (
        MailboxSender {
            shared: shared.clone(),
        },
        MailboxReceiver { shared },
    )
}

/// Publisher side of a mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MailboxSender {
    shared: Arc<Shared>,
}

impl MailboxSender {
    /// Push a message. Never blocks.
    pub fn push(&self, message: Arc<GroupMessage>) -> PushOutcome {
        let outcome = {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }

            if inner.messages.len() < self.shared.capacity {
                inner.messages.push_back(message);
                PushOutcome::Queued
            } else {
                match self.shared.policy {
                    OverflowPolicy::DropOldest => {
                        inner.messages.pop_front();
                        inner.messages.push_back(message);
                        inner.dropped += 1;
                        PushOutcome::DroppedOldest
                    }
                    OverflowPolicy::Disconnect => {
                        inner.messages.clear();
                        inner.closed = true;
                        inner.overflowed = true;
                        PushOutcome::Overflowed
                    }
                }
            }
        };

        self.shared.notify.notify_one();
        outcome
    }

    /// Close the mailbox; the receiver drains nothing further.
    pub fn close(&self) {
        close(&self.shared);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }
}

/// Session side of a mailbox.
#[derive(Debug)]
pub struct MailboxReceiver {
    shared: Arc<Shared>,
}

impl MailboxReceiver {
    /// Wait for the next message. `None` once the mailbox is closed.
    pub async fn recv(&mut self) -> Option<Arc<GroupMessage>> {
        loop {
            {
                let mut inner = self.shared.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(message) = inner.messages.pop_front() {
                    return Some(message);
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&mut self) -> Option<Arc<GroupMessage>> {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return None;
        }
        inner.messages.pop_front()
    }

    /// Whether the mailbox was closed by a disconnect-on-overflow.
    pub fn is_overflowed(&self) -> bool {
        self.shared.inner.lock().overflowed
    }

    /// Messages discarded by drop-oldest so far.
    pub fn dropped(&self) -> u64 {
        self.shared.inner.lock().dropped
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn close(&self) {
        close(&self.shared);
    }
}

impl Drop for MailboxReceiver {
    fn drop(&mut self) {
        close(&self.shared);
    }
}

fn close(shared: &Shared) {
    {
        let mut inner = shared.inner.lock();
        inner.closed = true;
        inner.messages.clear();
    }
    shared.notify.notify_one();
}
