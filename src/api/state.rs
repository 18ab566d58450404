use crate::core::AppConfig;
use crate::notify::FanoutEngine;

/// Shared by every request handler. Nothing in here changes after
/// startup so it is shared without a lock.
pub struct AppState {
    pub engine: FanoutEngine,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(engine: FanoutEngine, config: AppConfig) -> Self {
        Self { engine, config }
    }
}
