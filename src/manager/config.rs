//! Manager configuration.

use std::time::Duration;

/// Default number of terminal tasks retained in history.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Default wall-clock budget for graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the task manager.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Number of terminal tasks to retain; the oldest completion is
    /// evicted first once the limit is exceeded.
    pub history_limit: usize,

    /// Shutdown budget used by [`super::TaskManager::shutdown_graceful`].
    pub shutdown_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
