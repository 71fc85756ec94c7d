//! Worker configuration.
//!
//! # Example
//!
//! ```
//! use scriptrpc_worker::WorkerConfig;
//! use std::time::Duration;
//!
//! let config = WorkerConfig::new()
//!     .with_wait_timeout(Duration::from_secs(5));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use tokio::runtime::Handle;

/// Configuration for a [`Worker`](crate::Worker).
///
/// # Fields
///
/// - `runtime` - tokio runtime that handler tasks are spawned on. When unset,
///   the runtime the worker is constructed in is used.
/// - `wait_timeout` - upper bound on a single [`Worker::wait`](crate::Worker::wait).
///   Unset by default: a call whose handler never returns keeps its run
///   pending for as long as the caller waits.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub runtime: Option<Handle>,
    pub wait_timeout: Option<Duration>,
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns handler tasks on `handle` instead of the ambient runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Gives up on a run that has not settled after `timeout`.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait timeout is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.wait_timeout.is_some_and(|t| t.is_zero()) {
            return Err("wait timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert!(config.runtime.is_none());
        assert!(config.wait_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_wait_timeout() {
        let config = WorkerConfig::new().with_wait_timeout(Duration::from_millis(1500));
        assert_eq!(config.wait_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = WorkerConfig::new().with_wait_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[tokio::test]
    async fn test_with_runtime() {
        let config = WorkerConfig::new().with_runtime(Handle::current());
        assert!(config.runtime.is_some());
    }
}
