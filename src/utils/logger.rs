use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Install the global subscriber. `RUST_LOG`, when set, wins over the configured level.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging_config.level_filter()?;
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter_layer);
    let installed = match logging_config.format.to_lowercase().as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        // Anything else falls back to human-readable console output.
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| ConfigError::Invalid(format!("logging already initialized: {}", e)))
}
