//! Logging setup
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed or the filter is malformed.
pub fn init_tracing(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}
