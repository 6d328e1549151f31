//! The session actor.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use livesub_proto::{ClientMessage, Command, Notification, ProtocolError, ServerMessage, SubscribeRequest};

use super::SessionContext;
use crate::broadcast::SessionId;
use crate::event::{GroupId, GroupMessage};
use crate::identity::Identity;
use crate::mailbox::MailboxReceiver;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting commands and event deliveries.
    Connected,
    /// Terminal; every membership has been released.
    Closed,
}

/// Channels connecting a session to its transport.
pub struct SessionIo {
    /// Raw text frames from the client. Closing this channel ends the session.
    pub commands: mpsc::Receiver<String>,
    /// Messages for the client.
    pub outbound: mpsc::Sender<ServerMessage>,
}

/// Broker-side state of one live connection.
///
/// A session is owned by its connection handler and only ever mutated by it;
/// other sessions and the translator reach it solely through its mailbox.
/// Dropping a session tears it down.
pub struct Session {
    id: SessionId,
    identity: Identity,
    state: SessionState,
    memberships: HashSet<GroupId>,
    ctx: Arc<SessionContext>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("memberships", &self.memberships)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(id: SessionId, identity: Identity, ctx: Arc<SessionContext>) -> Self {
        Self {
            id,
            identity,
            state: SessionState::Connected,
            memberships: HashSet::new(),
            ctx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_member(&self, group: &GroupId) -> bool {
        self.memberships.contains(group)
    }

    pub fn memberships(&self) -> impl Iterator<Item = &GroupId> {
        self.memberships.iter()
    }

    pub fn membership_count(&self) -> usize {
        self.memberships.len()
    }

    /// Handle one text frame from the client.
    ///
    /// Returns the protocol error to send back, if any. Errors never change
    /// session state.
    pub fn handle_frame(&mut self, text: &str) -> Option<ServerMessage> {
        let result = ClientMessage::parse(text)
            .and_then(ClientMessage::into_command)
            .and_then(|command| self.handle_command(command));

        match result {
            Ok(_) => None,
            Err(err) => {
                self.ctx.metrics.record_protocol_error();
                debug!(session = self.id, code = err.code, error = %err.message, "rejected client command");
                Some(err.into())
            }
        }
    }

    /// Apply a validated command. Returns whether a membership changed.
    pub fn handle_command(&mut self, command: Command) -> Result<bool, ProtocolError> {
        match command {
            Command::Subscribe(request) => self.subscribe(&request),
            Command::Unsubscribe(request) => self.unsubscribe(&request),
        }
    }

    /// Join the group named by `request`.
    ///
    /// Unknown models are a protocol error. A known model whose grouping
    /// field has no registered config is accepted and ignored, since no
    /// event could ever be routed there.
    pub fn subscribe(&mut self, request: &SubscribeRequest) -> Result<bool, ProtocolError> {
        if self.state == SessionState::Closed {
            return Ok(false);
        }

        let group = self.resolve(request)?;
        if self.ctx.registry.lookup(&group.entity_type, &group.grouping_field).is_empty() {
            debug!(
                session = self.id,
                model = %group.entity_type,
                grouping_field = %group.grouping_field,
                "no subscription registered for axis, ignoring subscribe"
            );
            return Ok(false);
        }

        if self.memberships.contains(&group) {
            return Ok(false);
        }

        self.ctx.channel.join(&group, self.id);
        debug!(session = self.id, group = %group, "subscribed");
        self.memberships.insert(group);
        self.sync_directory();
        Ok(true)
    }

    /// Leave the group named by `request`. Not being a member is fine.
    pub fn unsubscribe(&mut self, request: &SubscribeRequest) -> Result<bool, ProtocolError> {
        if self.state == SessionState::Closed {
            return Ok(false);
        }

        let group = self.resolve(request)?;
        if !self.memberships.remove(&group) {
            return Ok(false);
        }

        self.ctx.channel.leave(&group, self.id);
        debug!(session = self.id, group = %group, "unsubscribed");
        self.sync_directory();
        Ok(true)
    }

    /// Build the notifications this session should receive for `message`.
    ///
    /// Every config registered on the message's axis is evaluated on its own:
    /// a permitted config yields one notification serialized by that config.
    pub fn deliver(&self, message: &GroupMessage) -> Vec<Notification> {
        if self.state == SessionState::Closed || !self.memberships.contains(&message.group) {
            return Vec::new();
        }

        let configs = self
            .ctx
            .registry
            .lookup(message.entity_type(), message.grouping_field());

        let mut notifications = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.permits(&self.identity, &message.instance) {
                self.ctx.metrics.record_permission_denied();
                trace!(session = self.id, group = %message.group, "permission check failed");
                continue;
            }

            notifications.push(Notification {
                model: message.entity_type().to_string(),
                instance: config.serialize(&message.instance),
                action: message.action,
                group_key_value: message.key_value.clone(),
            });
        }

        self.ctx.metrics.record_deliveries(notifications.len());
        notifications
    }

    /// Release every membership and mark the session closed. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        for group in self.memberships.drain() {
            self.ctx.channel.leave(&group, self.id);
        }
        self.ctx.channel.detach(self.id);
        self.ctx.directory.remove(&self.id);
        self.ctx.metrics.record_session_closed();
        self.state = SessionState::Closed;

        info!(session = self.id, "session closed");
    }

    /// Drive the session until the connection or the mailbox closes.
    pub async fn run(mut self, io: SessionIo, mut mailbox: MailboxReceiver) {
        let SessionIo {
            mut commands,
            outbound,
        } = io;

        'session: loop {
            tokio::select! {
                frame = commands.recv() => match frame {
                    Some(text) => {
                        if let Some(reply) = self.handle_frame(&text) {
                            if outbound.send(reply).await.is_err() {
                                break 'session;
                            }
                        }
                    }
                    None => {
                        debug!(session = self.id, "connection closed");
                        break 'session;
                    }
                },
                message = mailbox.recv() => match message {
                    Some(message) => {
                        for notification in self.deliver(&message) {
                            if outbound.send(notification.into()).await.is_err() {
                                break 'session;
                            }
                        }
                    }
                    None => {
                        if mailbox.is_overflowed() {
                            let err = ProtocolError::mailbox_overflow(mailbox.capacity());
                            let _ = outbound.send(err.into()).await;
                        }
                        break 'session;
                    }
                },
            }
        }

        self.close();
    }

    fn resolve(&self, request: &SubscribeRequest) -> Result<GroupId, ProtocolError> {
        let model = self
            .ctx
            .registry
            .model(&request.model)
            .ok_or_else(|| ProtocolError::unknown_model(&request.model))?;

        let field = request
            .property
            .clone()
            .unwrap_or_else(|| model.primary_key().to_string());

        Ok(GroupId::new(request.model.clone(), field, request.key.clone()))
    }

    fn sync_directory(&self) {
        if let Some(mut info) = self.ctx.directory.get_mut(&self.id) {
            info.subscriptions = self.memberships.len();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
