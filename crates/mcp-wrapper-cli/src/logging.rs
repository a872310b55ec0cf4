use std::env;
use std::io;

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "MCP_WRAPPER_LOG";
pub const LOG_JSON_ENV: &str = "MCP_WRAPPER_LOG_JSON";
const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
}

impl LogSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup(LOG_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let json = lookup(LOG_JSON_ENV).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        });
        Self {
            filter,
            format: if json {
                LogFormat::Json
            } else {
                LogFormat::Compact
            },
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

/// Installs the global subscriber. Diagnostics always go to stderr so the toolkit's
/// stdout stays untouched.
pub fn init(settings: &LogSettings) {
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|err| {
        eprintln!("ignoring invalid {LOG_ENV} value '{}': {err}", settings.filter);
        EnvFilter::new(DEFAULT_FILTER)
    });
    let registry = tracing_subscriber::registry().with(filter);

    let _ = match settings.format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
}
