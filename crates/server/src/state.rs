use std::sync::Arc;

use queuedesk_core::{BroadcastPublisher, Config, QueueOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<QueueOrchestrator>,
    publisher: Arc<BroadcastPublisher>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<QueueOrchestrator>,
        publisher: Arc<BroadcastPublisher>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            publisher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &QueueOrchestrator {
        &self.orchestrator
    }

    /// Source of the events fanned out to WebSocket clients.
    pub fn publisher(&self) -> &BroadcastPublisher {
        &self.publisher
    }
}
