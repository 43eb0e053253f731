use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::{AgentError, Result};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so
/// that stdout stays free for the agent's answer.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|err| {
            AgentError::Config(format!("Invalid log level `{}`: {err}", config.level))
        })?,
    };

    let layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|err| AgentError::Config(format!("Logging already initialised: {err}")))?;

    tracing::debug!(level = %config.level, json = config.json, "logging initialised");
    Ok(())
}
