//! Logging bootstrap.
//!
//! The terminal belongs to the UI, so log records go to a file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::TuiError;

/// Install the global subscriber, appending to `config.path`.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(config: &LogConfig) -> Result<(), TuiError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| TuiError::Logging(format!("invalid log filter: {e}")))?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| TuiError::Logging(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(path = %config.path.display(), "logging initialized");
    Ok(())
}
