//! Group broadcast channel.
//!
//! A [`GroupChannel`] tracks which sessions belong to which broadcast groups
//! and fans published messages out to their mailboxes. [`LocalChannel`]
//! serves the sessions of this process; [`BridgedChannel`] additionally hands
//! every publish to a [`RemoteFanout`] backend so other server instances can
//! deliver to their own members.

mod bridge;
mod local;

use std::sync::Arc;

pub use bridge::{BridgedChannel, RemoteFanout};
pub use local::LocalChannel;

use crate::event::{GroupId, GroupMessage};
use crate::mailbox::MailboxSender;

/// Identifier of a session within one process.
pub type SessionId = u64;

/// Group membership and publication.
///
/// Join and leave are atomic with respect to publish: a publish never sees a
/// half-applied membership change, and a join that returned before a publish
/// started is always observed by it. No method blocks on a slow member.
pub trait GroupChannel: Send + Sync {
    /// Register the mailbox that receives messages for `session`.
    fn attach(&self, session: SessionId, mailbox: MailboxSender);

    /// Forget the mailbox of `session`.
    fn detach(&self, session: SessionId);

    /// Add `session` to `group`. Joining twice has no further effect.
    fn join(&self, group: &GroupId, session: SessionId);

    /// Remove `session` from `group`. Leaving a group not joined is a no-op.
    fn leave(&self, group: &GroupId, session: SessionId);

    /// Deliver `message` to every current member of `group`.
    ///
    /// Returns the number of mailboxes that accepted the message; publishing
    /// to a group without members returns 0.
    fn publish(&self, group: &GroupId, message: Arc<GroupMessage>) -> usize;

    /// Number of process-local members of `group`.
    fn member_count(&self, group: &GroupId) -> usize;

    /// Number of groups with at least one process-local member.
    fn group_count(&self) -> usize;
}
