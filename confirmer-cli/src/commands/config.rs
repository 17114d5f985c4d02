//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init` for viewing and
//! creating the configuration file.

use clap::Subcommand;
use confirmer::config::{config_file_path, ConfigFile};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (defaults filled in)
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    let path = resolve_path(config_path);
    match command {
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("; {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run_init(&path, false).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[coordinator]\nfailure_history = 3\n").unwrap();

        assert!(matches!(run_init(&path, false), Err(CliError::Config(_))));
        run_init(&path, true).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}
