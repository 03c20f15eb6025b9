//! Tracing subscriber setup

use anyhow::Result;
use steady_config::domains::logging::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing to stderr
///
/// The filter comes from `--log-level` if given, else `RUST_LOG`, else the
/// configured level. `log` records from the library crates are bridged in.
pub fn init_tracing(config: &LoggingConfig, log_level: Option<&str>) -> Result<()> {
    let fallback = config.level.to_string();
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to '{}'", level, fallback);
            EnvFilter::new(&fallback)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // Use try_init to avoid panic if global subscriber already set
    let initialized = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if initialized.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
