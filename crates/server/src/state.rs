use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashvault_core::{Config, Offloader};

/// Shared application state
pub struct AppState {
    config: Config,
    offloader: Arc<Offloader>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, offloader: Arc<Offloader>) -> Self {
        Self {
            config,
            offloader,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn offloader(&self) -> &Offloader {
        &self.offloader
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
