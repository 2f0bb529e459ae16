use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingSettings};

/// Initialize structured logging with tracing-subscriber, writing to stderr.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to the configured level.
pub fn init(settings: &LoggingSettings) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match settings.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
