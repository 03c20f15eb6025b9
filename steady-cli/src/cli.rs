//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "steady", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command with retries, a circuit breaker and rate limiting
    Run {
        /// Label used in log lines and circuit breaker errors
        #[arg(long, value_name = "STRING")]
        label: Option<String>,

        /// Override the configured number of retries
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,

        /// Program and arguments to run (after `--`)
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration with all defaults
    Sample,

    /// Load and validate a configuration file
    Validate {
        /// Configuration file (defaults to --config)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}
