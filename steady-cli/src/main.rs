use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use steady_config::{ConfigLoader, LoggingConfig, SteadyConfig};
use steady_resilience::{RateLimiter, RetryController};
use tracing::{debug, info, warn};

mod cli;
mod command;
mod logging;

use cli::{Cli, Commands, ConfigCommands};
use command::ProcessOperation;

/// Load configuration from the given path, or from the environment only
fn load_config(config_path: Option<&Path>) -> Result<SteadyConfig> {
    ConfigLoader::new()
        .load(config_path)
        .context("Failed to load configuration")
}

/// Run a command through the rate limiter and retry controller
async fn run_command(
    config: SteadyConfig,
    label: Option<String>,
    max_retries: Option<u32>,
    argv: Vec<String>,
) -> Result<()> {
    let operation = ProcessOperation::from_argv(argv).context("No command given to run")?;
    let label = label.unwrap_or_else(|| operation.program().to_string());

    let mut retry = config.retry;
    if let Some(max_retries) = max_retries {
        retry.max_retries = max_retries;
    }

    let limiter = RateLimiter::new(config.rate_limit);
    let controller = RetryController::new(retry);
    debug!("Running '{}' with {:?}", label, controller.config());

    let result = controller
        .execute(&label, || {
            let limiter = limiter.clone();
            let operation = &operation;
            async move {
                limiter.admit().await;
                operation.invoke().await
            }
        })
        .await;

    match result {
        Ok(stdout) => {
            info!("'{}' completed", label);
            print!("{}", stdout);
            Ok(())
        }
        Err(err) => {
            warn!(
                "'{}' failed; circuit status {:?}, usage {:?}",
                label,
                controller.status(),
                limiter.usage()
            );
            Err(err).with_context(|| format!("Command '{}' failed", label))
        }
    }
}

/// Handle `config` subcommands
fn handle_config_command(config_cmd: ConfigCommands, global_path: Option<PathBuf>) -> Result<()> {
    match config_cmd {
        ConfigCommands::Sample => {
            print!("{}", SteadyConfig::generate_sample());
            Ok(())
        }
        ConfigCommands::Validate { path } => {
            let path = path.or(global_path);
            load_config(path.as_deref())?;
            match path {
                Some(path) => println!("Configuration in {} is valid", path.display()),
                None => println!("Environment configuration is valid"),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { config_cmd } => {
            logging::init_tracing(&LoggingConfig::default(), cli.log_level.as_deref())?;
            handle_config_command(config_cmd, cli.config)
        }
        Commands::Run {
            label,
            max_retries,
            command,
        } => {
            let config = load_config(cli.config.as_deref())?;
            logging::init_tracing(&config.logging, cli.log_level.as_deref())?;
            run_command(config, label, max_retries, command).await
        }
    }
}
