use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "http-input", version, about = "Polling HTTP metrics input")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "http_input.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single collection pass and print the metrics
    Gather,

    /// Collect repeatedly until interrupted
    Run {
        /// Override the configured interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Show current configuration with secrets masked
    Show,
    /// Validate configuration file
    Validate,
}
