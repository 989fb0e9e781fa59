//! Logging initialization for the CLI.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the `--log-level` flag.

use std::io;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// * `level` - Default log level (trace, debug, info, warn, error)
/// * `json` - Emit one JSON object per line instead of compact text
pub fn init_logging(level: &str, json: bool) {
    let default_level = parse_level(level).to_string().to_lowercase();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
