//! Coordinator configuration.
//!
//! This module contains the [`CoordinatorConfig`] struct and related
//! constants for configuring the confirmation coordinator.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default number of unhandled failures kept for diagnostics.
pub const DEFAULT_FAILURE_HISTORY: usize = 64;

/// Default in-flight duration after which a request is reported as stalled.
pub const DEFAULT_STALL_THRESHOLD_SECS: u64 = 30;

/// Default watchdog check interval.
pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 10;

// =============================================================================
// Coordinator Configuration
// =============================================================================

/// Configuration for the confirmation coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Timeout applied to requests submitted without one.
    ///
    /// `None` lets such requests wait indefinitely.
    pub default_timeout: Option<Duration>,

    /// Unhandled failures kept in the diagnostics history.
    pub failure_history: usize,

    /// In-flight duration after which the watchdog warns.
    pub stall_threshold: Duration,

    /// How often the watchdog checks for stalled requests.
    pub watchdog_interval: Duration,
}

impl CoordinatorConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_failure_history(mut self, capacity: usize) -> Self {
        self.failure_history = capacity;
        self
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            failure_history: DEFAULT_FAILURE_HISTORY,
            stall_threshold: Duration::from_secs(DEFAULT_STALL_THRESHOLD_SECS),
            watchdog_interval: Duration::from_secs(DEFAULT_WATCHDOG_INTERVAL_SECS),
        }
    }
}

impl From<&crate::config::CoordinatorSettings> for CoordinatorConfig {
    fn from(settings: &crate::config::CoordinatorSettings) -> Self {
        Self {
            default_timeout: settings.default_timeout_ms.map(Duration::from_millis),
            failure_history: settings.failure_history,
            stall_threshold: Duration::from_secs(settings.stall_threshold_secs),
            watchdog_interval: Duration::from_secs(settings.watchdog_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorSettings;

    #[test]
    fn test_coordinator_config_default() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.default_timeout, None);
        assert_eq!(config.failure_history, DEFAULT_FAILURE_HISTORY);
        assert_eq!(
            config.stall_threshold,
            Duration::from_secs(DEFAULT_STALL_THRESHOLD_SECS)
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = CoordinatorConfig::default()
            .with_default_timeout(Duration::from_millis(250))
            .with_failure_history(4)
            .with_stall_threshold(Duration::from_secs(1))
            .with_watchdog_interval(Duration::from_millis(100));

        assert_eq!(config.default_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.failure_history, 4);
        assert_eq!(config.stall_threshold, Duration::from_secs(1));
        assert_eq!(config.watchdog_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_from_settings() {
        let settings = CoordinatorSettings {
            default_timeout_ms: Some(1500),
            failure_history: 8,
            stall_threshold_secs: 5,
            watchdog_interval_secs: 2,
        };
        let config = CoordinatorConfig::from(&settings);

        assert_eq!(config.default_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.failure_history, 8);
        assert_eq!(config.stall_threshold, Duration::from_secs(5));
        assert_eq!(config.watchdog_interval, Duration::from_secs(2));
    }
}
