use std::sync::Arc;

use livesub_core::{CdcHandle, LiveBroker, Registry};

use crate::auth::Authenticator;
use crate::config::ServerConfig;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub broker: LiveBroker,
    pub cdc: CdcHandle,
    pub auth: Arc<dyn Authenticator>,
    pub config: ServerConfig,
}

impl AppState {
    /// Assemble the broker and start its CDC processor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig, registry: Registry, auth: Arc<dyn Authenticator>) -> Self {
        let broker = LiveBroker::new(registry, config.broker.clone());
        let cdc = broker.start_cdc(config.cdc_buffer);

        Self {
            broker,
            cdc,
            auth,
            config,
        }
    }
}
