//! Logging configuration and initialization.

use std::env;

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-readable output
    #[default]
    Pretty,
    /// Single-line output, suited to cron mail and journald
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to `Pretty`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Local time with offset
    #[default]
    Local,
    /// UTC, RFC 3339
    Utc,
    /// No timestamps
    None,
}

impl TimestampFormat {
    /// Parse a timestamp mode, falling back to `Local`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format
    pub format: LogFormat,
    /// Timestamp format
    pub timestamps: TimestampFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// Include source file and line
    pub include_location: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Include target (module path)
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    ///
    /// Reads `LOG_FORMAT`, `LOG_TIMESTAMPS`, `LOG_LEVEL`, `LOG_LOCATION`
    /// and `LOG_THREAD_IDS`.
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: env::var("LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            include_thread_ids: env::var("LOG_THREAD_IDS")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            include_target: true,
        }
    }

    /// Set the default log level
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `default_level` when it is set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the
/// default level is not a valid filter directive.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_level)?,
    };
    let registry = tracing_subscriber::registry().with(env_filter);

    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(config.format != LogFormat::Json && atty::is(atty::Stream::Stdout));

    // Each arm produces a different layer type, so each installs its own subscriber.
    match (config.format, config.timestamps) {
        (LogFormat::Json, TimestampFormat::None) => {
            registry.with(layer.json().without_time()).try_init()?
        }
        (LogFormat::Json, _) => registry
            .with(layer.json().with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string())))
            .try_init()?,
        (LogFormat::Compact, TimestampFormat::None) => {
            registry.with(layer.compact().without_time()).try_init()?
        }
        (LogFormat::Compact, TimestampFormat::Utc) => registry
            .with(layer.compact().with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string())))
            .try_init()?,
        (LogFormat::Compact, TimestampFormat::Local) => registry
            .with(layer.compact().with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %z".to_string())))
            .try_init()?,
        (LogFormat::Pretty, TimestampFormat::None) => {
            registry.with(layer.without_time()).try_init()?
        }
        (LogFormat::Pretty, TimestampFormat::Utc) => registry
            .with(layer.with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string())))
            .try_init()?,
        (LogFormat::Pretty, TimestampFormat::Local) => registry
            .with(layer.with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %z".to_string())))
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Pretty);
    }

    #[test]
    fn test_timestamp_format_parse() {
        assert_eq!(TimestampFormat::parse("UTC"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("off"), TimestampFormat::None);
        assert_eq!(TimestampFormat::parse("local"), TimestampFormat::Local);
    }

    #[test]
    fn test_default_level_override() {
        let config = LogConfig::default().with_default_level("debug");
        assert_eq!(config.default_level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.include_thread_ids);
    }
}
