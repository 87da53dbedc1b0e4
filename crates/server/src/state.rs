use std::sync::Arc;

use audiograb_core::{Authenticator, Config, PipelineCoordinator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    coordinator: PipelineCoordinator,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        coordinator: PipelineCoordinator,
    ) -> Self {
        Self {
            config,
            authenticator,
            coordinator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.coordinator
    }
}
