//! Wiring of registry, channel, translator and session manager.

use std::sync::Arc;

use crate::broadcast::{GroupChannel, LocalChannel};
use crate::cdc::{start_processor, CdcHandle};
use crate::config::BrokerConfig;
use crate::metrics::{BrokerMetrics, SharedMetrics};
use crate::registry::Registry;
use crate::session::SessionManager;
use crate::translator::ChangeTranslator;

/// A fully assembled broker.
///
/// Hand [`LiveBroker::translator`] to the persistence layer's write path and
/// [`LiveBroker::sessions`] to the connection handler.
#[derive(Clone)]
pub struct LiveBroker {
    registry: Arc<Registry>,
    channel: Arc<dyn GroupChannel>,
    sessions: Arc<SessionManager>,
    translator: Arc<ChangeTranslator>,
    metrics: SharedMetrics,
}

impl LiveBroker {
    /// Assemble a single-process broker.
    pub fn new(registry: Registry, config: BrokerConfig) -> Self {
        let metrics = Arc::new(BrokerMetrics::new());
        let channel = Arc::new(LocalChannel::new(metrics.clone()));
        Self::with_channel(Arc::new(registry), channel, metrics, config)
    }

    /// Assemble a broker around an existing channel, e.g. a
    /// [`BridgedChannel`](crate::broadcast::BridgedChannel).
    pub fn with_channel(
        registry: Arc<Registry>,
        channel: Arc<dyn GroupChannel>,
        metrics: SharedMetrics,
        config: BrokerConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            registry.clone(),
            channel.clone(),
            metrics.clone(),
            config,
        ));
        let translator = Arc::new(ChangeTranslator::new(
            registry.clone(),
            channel.clone(),
            metrics.clone(),
        ));

        Self {
            registry,
            channel,
            sessions,
            translator,
            metrics,
        }
    }

    /// Spawn a CDC processor feeding this broker's translator.
    pub fn start_cdc(&self, buffer_size: usize) -> CdcHandle {
        start_processor(self.translator.clone(), buffer_size)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn channel(&self) -> &Arc<dyn GroupChannel> {
        &self.channel
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn translator(&self) -> &Arc<ChangeTranslator> {
        &self.translator
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}
