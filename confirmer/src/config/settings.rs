//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. Reading
//! lives in [`super::parser`], writing in [`super::writer`].

use std::path::{Path, PathBuf};

use super::defaults::config_file_path;
use super::parser::{self, ConfigFileError};
use super::writer;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Coordinator settings
    pub coordinator: CoordinatorSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Timeout in milliseconds for requests submitted without one.
    /// `None` disables the default timeout.
    pub default_timeout_ms: Option<u64>,
    /// Number of unhandled failures kept for diagnostics.
    pub failure_history: usize,
    /// Seconds a request may stay in flight before the watchdog warns.
    pub stall_threshold_secs: u64,
    /// Seconds between watchdog checks.
    pub watchdog_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for log files
    pub directory: PathBuf,
    /// Log file name within `directory`
    pub file: String,
}

impl ConfigFile {
    /// Load from ~/.confirmer/config.ini, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        parser::load(path)
    }

    /// Write the commented INI form to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        writer::save(self, path)
    }

    /// Render the configuration as commented INI text.
    pub fn to_ini_string(&self) -> String {
        writer::to_config_string(self)
    }
}
