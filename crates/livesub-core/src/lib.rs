//! livesub core - the subscription broker.
//!
//! Clients keep a long-lived connection open and subscribe to groups of
//! entities. Whenever the persistence layer creates, updates or deletes an
//! entity, the [`ChangeTranslator`] works out which broadcast groups are
//! affected and publishes to them; every [`Session`] that joined one of those
//! groups applies its permission checks and serializers and pushes the result
//! to its connection.
//!
//! # Modules
//!
//! - [`registry`] - Static table of subscribable models and their configs
//! - [`translator`] - Lifecycle notifications to broadcast groups
//! - [`broadcast`] - Group membership and fan-out, local and bridged
//! - [`mailbox`] - Bounded per-session inbox with an overflow policy
//! - [`session`] - Per-connection actor and the session manager
//! - [`cdc`] - Queue-based ingestion of lifecycle notifications
//! - [`metrics`] - Broker counters

pub mod broadcast;
pub mod broker;
pub mod cdc;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod mailbox;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod session;
pub mod translator;

pub use broadcast::{BridgedChannel, GroupChannel, LocalChannel, RemoteFanout, SessionId};
pub use broker::LiveBroker;
pub use cdc::{CdcHandle, CdcProcessor, LifecycleNotification};
pub use config::{BrokerConfig, OverflowPolicy};
pub use error::{Error, Result};
pub use event::{ChangeEvent, GroupId, GroupMessage};
pub use identity::{Identity, Principal};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender, PushOutcome};
pub use metrics::{BrokerMetrics, MetricsSnapshot, SharedMetrics};
pub use record::Record;
pub use registry::{
    AllowAll, FieldAccessor, FieldProjection, FullRecord, ModelDef, PermissionCheck, Registry,
    RegistryBuilder, Serializer, SubscriptionConfig,
};
pub use session::{
    Session, SessionInfo, SessionIo, SessionManager, SessionState, SessionSummary,
};
pub use translator::{ChangeTranslator, DispatchReport, SkippedAxis};

/// Re-export protocol types.
pub use livesub_proto as proto;
