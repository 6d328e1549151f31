//! Session manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use super::{Session, SessionContext, SessionIo};
use crate::broadcast::{GroupChannel, SessionId};
use crate::config::BrokerConfig;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::mailbox::{mailbox, MailboxReceiver};
use crate::metrics::SharedMetrics;
use crate::registry::Registry;

/// Directory entry for a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub subject: Option<String>,
    pub connected_at: Instant,
    pub subscriptions: usize,
}

/// Serializable view of a [`SessionInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub age_secs: u64,
    pub subscriptions: usize,
}

impl From<&SessionInfo> for SessionSummary {
    fn from(info: &SessionInfo) -> Self {
        Self {
            id: info.id,
            subject: info.subject.clone(),
            age_secs: info.connected_at.elapsed().as_secs(),
            subscriptions: info.subscriptions,
        }
    }
}

/// Creates sessions and keeps a directory of the live ones.
pub struct SessionManager {
    ctx: Arc<SessionContext>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(
        registry: Arc<Registry>,
        channel: Arc<dyn GroupChannel>,
        metrics: SharedMetrics,
        config: BrokerConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(SessionContext {
                registry,
                channel,
                metrics,
                config,
                directory: DashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a session for a newly established connection.
    ///
    /// The session starts `Connected` with no memberships; its mailbox is
    /// attached to the group channel before this returns.
    pub fn connect(&self, identity: Identity) -> Result<(Session, MailboxReceiver)> {
        let max = self.ctx.config.max_sessions;
        if self.ctx.directory.len() >= max {
            return Err(Error::TooManySessions(max));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mailbox(self.ctx.config.mailbox_capacity, self.ctx.config.overflow_policy);
        self.ctx.channel.attach(id, tx);
        self.ctx.directory.insert(
            id,
            SessionInfo {
                id,
                subject: identity.subject().map(str::to_string),
                connected_at: Instant::now(),
                subscriptions: 0,
            },
        );
        self.ctx.metrics.record_session_opened();

        info!(session = id, subject = ?identity.subject(), "session opened");
        Ok((Session::new(id, identity, self.ctx.clone()), rx))
    }

    /// Open a session and drive it on a background task.
    pub fn spawn(&self, identity: Identity, io: SessionIo) -> Result<SessionId> {
        let (session, mailbox) = self.connect(identity)?;
        let id = session.id();
        tokio::spawn(session.run(io, mailbox));
        Ok(id)
    }

    pub fn session_count(&self) -> usize {
        self.ctx.directory.len()
    }

    pub fn has_session(&self, id: SessionId) -> bool {
        self.ctx.directory.contains_key(&id)
    }

    pub fn session_info(&self, id: SessionId) -> Option<SessionInfo> {
        self.ctx.directory.get(&id).map(|entry| entry.clone())
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = self
            .ctx
            .directory
            .iter()
            .map(|entry| SessionSummary::from(entry.value()))
            .collect();
        sessions.sort_by_key(|summary| summary.id);
        sessions
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.ctx.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.ctx.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::LocalChannel;
    use crate::event::{GroupId, GroupMessage};
    use crate::metrics::BrokerMetrics;
    use crate::record::Record;
    use crate::registry::{FieldProjection, ModelDef, SubscriptionConfig};
    use crate::session::SessionState;
    use livesub_proto::{error_codes, Action, ClientMessage, KeyValue, ServerMessage, SubscribeRequest};
    use serde_json::json;

    struct Fixture {
        manager: SessionManager,
        channel: Arc<LocalChannel>,
        metrics: SharedMetrics,
    }

    fn fixture(config: BrokerConfig) -> Fixture {
        let registry = Registry::builder()
            .model(ModelDef::new("app.Task", "id"))
            .register(SubscriptionConfig::new(
                "app.Task",
                FieldProjection::new(["id", "text", "done"]),
            ))
            .register(
                SubscriptionConfig::new("app.Task", FieldProjection::new(["id"]))
                    .group_by("list_id"),
            )
            .build();
        let metrics = Arc::new(BrokerMetrics::new());
        let channel = Arc::new(LocalChannel::new(metrics.clone()));
        let manager = SessionManager::new(
            Arc::new(registry),
            channel.clone(),
            metrics.clone(),
            config,
        );
        Fixture {
            manager,
            channel,
            metrics,
        }
    }

    fn request(property: Option<&str>, key: i64) -> SubscribeRequest {
        SubscribeRequest {
            model: "app.Task".into(),
            property: property.map(str::to_string),
            key: KeyValue::from(key),
        }
    }

    fn task_message(group: GroupId) -> GroupMessage {
        GroupMessage {
            group,
            action: Action::Created,
            instance: Record::new()
                .with_field("id", 1)
                .with_field("text", "test")
                .with_field("done", false)
                .with_field("list_id", 7),
            key_value: json!(1),
        }
    }

    #[test]
    fn test_connect_registers_session() {
        let fx = fixture(BrokerConfig::default());
        let (session, _mailbox) = fx.manager.connect(Identity::user("alice")).unwrap();

        assert_eq!(session.state(), SessionState::Connected);
        assert!(fx.manager.has_session(session.id()));
        assert_eq!(fx.channel.session_count(), 1);

        let info = fx.manager.session_info(session.id()).unwrap();
        assert_eq!(info.subject.as_deref(), Some("alice"));
        assert_eq!(fx.manager.list_sessions().len(), 1);
    }

    #[test]
    fn test_session_limit() {
        let fx = fixture(BrokerConfig::default().with_max_sessions(1));
        let _first = fx.manager.connect(Identity::Anonymous).unwrap();

        let err = fx.manager.connect(Identity::Anonymous).unwrap_err();
        assert!(matches!(err, Error::TooManySessions(1)));
    }

    #[test]
    fn test_subscribe_defaults_to_primary_key() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        assert!(session.subscribe(&request(None, 1)).unwrap());
        let group = GroupId::new("app.Task", "id", 1);
        assert!(session.is_member(&group));
        assert_eq!(fx.channel.member_count(&group), 1);
        assert_eq!(fx.manager.session_info(session.id()).unwrap().subscriptions, 1);
    }

    #[test]
    fn test_subscribe_twice_is_noop() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        assert!(session.subscribe(&request(Some("list_id"), 7)).unwrap());
        assert!(!session.subscribe(&request(Some("list_id"), 7)).unwrap());
        assert_eq!(session.membership_count(), 1);
        assert_eq!(fx.channel.member_count(&GroupId::new("app.Task", "list_id", 7)), 1);
    }

    #[test]
    fn test_unregistered_axis_is_silent_noop() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        assert!(!session.subscribe(&request(Some("owner"), 3)).unwrap());
        assert_eq!(session.membership_count(), 0);
        assert_eq!(fx.channel.group_count(), 0);
    }

    #[test]
    fn test_unknown_model_is_protocol_error() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        let reply = session
            .handle_frame(r#"{"model": "app.Nope", "value": 1}"#)
            .unwrap();
        let ServerMessage::Error { error } = reply else {
            panic!("expected an error");
        };
        assert_eq!(error.code, error_codes::UNKNOWN_MODEL);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.membership_count(), 0);
        assert_eq!(fx.metrics.snapshot().protocol_errors, 1);
    }

    #[test]
    fn test_malformed_frames_keep_session_open() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();
        session.subscribe(&request(None, 1)).unwrap();

        assert!(session.handle_frame("garbage").unwrap().is_error());
        assert!(session.handle_frame(r#"{"model": "app.Task"}"#).unwrap().is_error());
        assert!(session.handle_frame(r#"{"value": 1}"#).unwrap().is_error());

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.membership_count(), 1);
    }

    #[test]
    fn test_frame_unsubscribe() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        let subscribe = ClientMessage::subscribe("app.Task", 1);
        let text = serde_json::to_string(&subscribe).unwrap();
        assert!(session.handle_frame(&text).is_none());
        assert_eq!(session.membership_count(), 1);

        let text = serde_json::to_string(&subscribe.into_unsubscribe()).unwrap();
        assert!(session.handle_frame(&text).is_none());
        assert_eq!(session.membership_count(), 0);
        assert_eq!(fx.channel.group_count(), 0);
    }

    #[test]
    fn test_unsubscribe_not_joined_is_noop() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();

        assert!(!session.unsubscribe(&request(Some("list_id"), 7)).unwrap());
        assert_eq!(fx.metrics.snapshot().protocol_errors, 0);
    }

    #[test]
    fn test_deliver_requires_membership() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();
        let group = GroupId::new("app.Task", "id", 1);

        assert!(session.deliver(&task_message(group.clone())).is_empty());

        session.subscribe(&request(None, 1)).unwrap();
        let notifications = session.deliver(&task_message(group));
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].instance,
            json!({"id": 1, "text": "test", "done": false})
        );
        assert_eq!(notifications[0].action, Action::Created);
    }

    #[test]
    fn test_close_releases_memberships_and_is_idempotent() {
        let fx = fixture(BrokerConfig::default());
        let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();
        session.subscribe(&request(None, 1)).unwrap();
        session.subscribe(&request(Some("list_id"), 7)).unwrap();
        assert_eq!(fx.channel.group_count(), 2);

        session.close();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(fx.channel.group_count(), 0);
        assert_eq!(fx.channel.session_count(), 0);
        assert_eq!(fx.manager.session_count(), 0);
        assert_eq!(fx.metrics.snapshot().sessions_closed, 1);

        assert!(!session.subscribe(&request(None, 1)).unwrap());
        assert_eq!(fx.channel.group_count(), 0);
    }

    #[test]
    fn test_drop_closes_session() {
        let fx = fixture(BrokerConfig::default());
        {
            let (mut session, _mailbox) = fx.manager.connect(Identity::Anonymous).unwrap();
            session.subscribe(&request(None, 1)).unwrap();
        }

        assert_eq!(fx.channel.group_count(), 0);
        assert_eq!(fx.manager.session_count(), 0);
    }
}
