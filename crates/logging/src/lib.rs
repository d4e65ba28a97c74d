//! Logging setup for onprem
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` always wins over the
//! configured level so a single run can be debugged without editing files.

use tracing_subscriber::{fmt, EnvFilter};

use common::error::{Error, Result};
use settings::LoggingSettings;

/// Builds the filter from `RUST_LOG`, falling back to the configured level
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| Error::Config(format!("invalid log level {:?}: {}", settings.level, e))),
    }
}

/// Initializes logging
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(settings)?;

    let result = if settings.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }

    Ok(())
}
