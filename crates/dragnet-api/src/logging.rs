//! Logging setup.

use dragnet_config::{LogFormat, LogSection};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log directives.
pub const LOG_ENV: &str = "DRAGNET_LOG";

/// Initialize the global tracing subscriber from the log section.
///
/// `DRAGNET_LOG` takes precedence over the configured level so operators
/// can raise verbosity without touching the config file.
///
/// # Errors
///
/// Fails if a subscriber is already installed.
pub fn init(log: &LogSection) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(log.level.clone()));

    match log.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}
