//! CLI runner for common setup.
//!
//! Encapsulates config loading, logging initialization and coordinator
//! creation so command handlers only deal with their own work.

use crate::error::CliError;
use confirmer::config::{config_file_path, ConfigFile};
use confirmer::coordinator::{Coordinator, CoordinatorConfig, TracingTelemetrySink};
use confirmer::logging::{init_logging, LoggingGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config (defaults if absent) and initialize logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        info!(
            config = %config_path.display(),
            version = confirmer::VERSION,
            "Confirmer CLI started"
        );

        Ok(Self {
            _logging_guard: logging_guard,
            config,
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Create a coordinator from the loaded settings, logging its telemetry.
    pub fn create_coordinator<V>(&self) -> Result<Coordinator<String, V>, CliError>
    where
        V: Clone + Send + 'static,
    {
        let config = CoordinatorConfig::from(&self.config.coordinator);
        Ok(Coordinator::with_telemetry(
            config,
            Arc::new(TracingTelemetrySink),
        )?)
    }
}
