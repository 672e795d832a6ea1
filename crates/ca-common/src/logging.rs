//! Tracing setup for the CLI front door.
//!
//! Splits between a human-readable terminal format and a structured JSON
//! format. No OTLP/parquet exporters: this tool runs as a one-shot batch
//! analysis, not a long-lived service.

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}, expected text|json")),
        }
    }
}

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops (mirrors `tracing`'s own `set_global_default`
/// semantics, which we swallow rather than panic on, since tests in this
/// workspace each call this independently).
pub fn init(format: LogFormat, verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Text => subscriber.with_target(false).try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };

    if let Err(err) = result {
        tracing::trace!("tracing subscriber already initialized: {err}");
    }
}
