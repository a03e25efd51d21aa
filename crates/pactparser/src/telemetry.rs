//! Tracing subscriber setup for the binary.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': {source}")]
    EnvFilter {
        value: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Output goes to stderr so stdout stays machine-readable.
pub fn init(config: &LogConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    tracing_log::LogTracer::init()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json {
        let subscriber = registry.with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry.with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

fn filter_for(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(level).map_err(|source| TelemetryError::EnvFilter {
        value: level.to_string(),
        source,
    })
}
