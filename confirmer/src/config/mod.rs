//! Configuration for the confirmer.
//!
//! Two layers:
//!
//! - [`ConfigFile`]: the user's `config.ini`, one settings struct per section.
//! - [`CoordinatorConfig`](crate::coordinator::CoordinatorConfig): the runtime
//!   configuration, built from [`CoordinatorSettings`] via `From`.
//!
//! # Example
//!
//! ```ignore
//! use confirmer::config::ConfigFile;
//! use confirmer::coordinator::CoordinatorConfig;
//!
//! let file = ConfigFile::load()?;
//! let config = CoordinatorConfig::from(&file.coordinator);
//! ```

mod defaults;
mod parser;
mod settings;
mod writer;

pub use defaults::{config_directory, config_file_path, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
pub use parser::ConfigFileError;
pub use settings::{ConfigFile, CoordinatorSettings, LoggingSettings};
