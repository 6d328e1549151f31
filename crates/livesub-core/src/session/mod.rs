//! Per-connection sessions.

mod actor;
mod manager;

pub use actor::{Session, SessionIo, SessionState};
pub use manager::{SessionInfo, SessionManager, SessionSummary};

use std::sync::Arc;

use dashmap::DashMap;

use crate::broadcast::{GroupChannel, SessionId};
use crate::config::BrokerConfig;
use crate::metrics::SharedMetrics;
use crate::registry::Registry;

/// Collaborators shared by every session of one manager.
pub(crate) struct SessionContext {
    pub(crate) registry: Arc<Registry>,
    pub(crate) channel: Arc<dyn GroupChannel>,
    pub(crate) metrics: SharedMetrics,
    pub(crate) config: BrokerConfig,
    pub(crate) directory: DashMap<SessionId, SessionInfo>,
}
