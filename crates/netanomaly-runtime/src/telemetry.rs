use tracing::Level;
use tracing_subscriber::filter::{ParseError, filter_fn};
use tracing_subscriber::registry;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to initialize telemetry subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),
}

/// Build the log filter from an explicit directive, else `RUST_LOG`, else `info`.
pub fn env_filter(directive: Option<&str>) -> Result<EnvFilter, TelemetryError> {
    match directive {
        Some(directive) => Ok(EnvFilter::try_new(directive)?),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for payloads.
pub fn install(directive: Option<&str>) -> Result<(), TelemetryError> {
    let env_filter = env_filter(directive)?;

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|m| {
            if let Some(path) = m.module_path() {
                // hyper logs every connection at debug level.
                if path.starts_with("hyper") && *m.level() >= Level::DEBUG {
                    return false;
                }
            }
            true
        }));

    let subscriber = registry().with(env_filter).with(layer);

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC => {info}");
        hook(info);
    }));

    match subscriber.try_init() {
        Ok(()) => Ok(()),
        Err(err) => Err(TelemetryError::Init(err)),
    }
}
