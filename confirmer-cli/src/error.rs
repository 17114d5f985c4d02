//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use confirmer::config::ConfigFileError;
use confirmer::coordinator::CoordinatorError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create the coordinator
    CoordinatorCreation(CoordinatorError),
    /// A demonstration scenario did not behave as expected
    Scenario { name: String, reason: String },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!("Check the file with 'confirmer config show' or recreate it with");
            eprintln!("'confirmer config init --force'.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::CoordinatorCreation(e) => write!(f, "Failed to create coordinator: {}", e),
            CliError::Scenario { name, reason } => {
                write!(f, "Scenario '{}' failed: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::CoordinatorCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CoordinatorError> for CliError {
    fn from(e: CoordinatorError) -> Self {
        CliError::CoordinatorCreation(e)
    }
}
