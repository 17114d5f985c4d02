//! Confirmer CLI - Command-line interface
//!
//! Drives the confirmation coordinator through demonstration scenarios and
//! manages its configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::demo::Scenario;

#[derive(Parser)]
#[command(name = "confirmer")]
#[command(version = confirmer::VERSION)]
#[command(about = "Coordinate asynchronous confirmations by key", long_about = None)]
struct Cli {
    /// Path to config.ini (defaults to ~/.confirmer/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demonstration scenario against a live coordinator
    Demo {
        /// Scenario to run
        #[arg(value_enum, default_value = "all")]
        scenario: Scenario,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo { scenario } => commands::demo::run(cli.config.as_deref(), scenario).await,
        Commands::Config(command) => commands::config::run(cli.config.as_deref(), command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
