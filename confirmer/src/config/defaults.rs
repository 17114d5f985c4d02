//! Default values and locations for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::coordinator::{
    DEFAULT_FAILURE_HISTORY, DEFAULT_STALL_THRESHOLD_SECS, DEFAULT_WATCHDOG_INTERVAL_SECS,
};

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "confirmer.log";

/// Directory holding the user's configuration (~/.confirmer).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".confirmer")
}

/// Path of the user's config file (~/.confirmer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            failure_history: DEFAULT_FAILURE_HISTORY,
            stall_threshold_secs: DEFAULT_STALL_THRESHOLD_SECS,
            watchdog_interval_secs: DEFAULT_WATCHDOG_INTERVAL_SECS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.coordinator.default_timeout_ms, None);
        assert_eq!(config.coordinator.failure_history, DEFAULT_FAILURE_HISTORY);
        assert_eq!(config.logging.file, DEFAULT_LOG_FILE);
        assert_eq!(config.logging.directory, PathBuf::from(DEFAULT_LOG_DIR));
    }

    #[test]
    fn test_config_file_path_ends_with_config_ini() {
        assert!(config_file_path().ends_with(".confirmer/config.ini"));
    }
}
