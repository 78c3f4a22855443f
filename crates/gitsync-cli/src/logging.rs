//! Process-wide tracing subscriber
//!
//! Logs go to stdout. The level flag sets the default directive; `RUST_LOG`
//! directives, when present, are layered on top of it.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Accepted log levels. `panic` and `fatal` behave like `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Compact `key=value` text
    Logfmt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Multi-line output; applies to the text format
    pub pretty: bool,
    /// ANSI colors; applies to the text format
    pub colors: bool,
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(settings: &LogSettings) -> Result<()> {
    tracing_subscriber::registry()
        .with(layer(settings))
        .try_init()
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })
}

fn layer(settings: &LogSettings) -> Box<dyn Layer<Registry> + Send + Sync> {
    let filter = EnvFilter::builder()
        .with_default_directive(settings.level.filter().into())
        .from_env_lossy();

    match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stdout)
            .with_filter(filter)
            .boxed(),
        LogFormat::Logfmt if settings.pretty => fmt::layer()
            .pretty()
            .with_ansi(settings.colors)
            .with_writer(std::io::stdout)
            .with_filter(filter)
            .boxed(),
        LogFormat::Logfmt => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(settings.colors)
            .with_writer(std::io::stdout)
            .with_filter(filter)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LogLevel::Panic, LevelFilter::ERROR)]
    #[case(LogLevel::Fatal, LevelFilter::ERROR)]
    #[case(LogLevel::Error, LevelFilter::ERROR)]
    #[case(LogLevel::Warn, LevelFilter::WARN)]
    #[case(LogLevel::Info, LevelFilter::INFO)]
    #[case(LogLevel::Debug, LevelFilter::DEBUG)]
    #[case(LogLevel::Trace, LevelFilter::TRACE)]
    fn test_level_filter(#[case] level: LogLevel, #[case] expected: LevelFilter) {
        assert_eq!(level.filter(), expected);
    }

    #[test]
    fn test_level_names_are_case_insensitive() {
        assert_eq!(LogLevel::from_str("FATAL", true), Ok(LogLevel::Fatal));
        assert_eq!(LogFormat::from_str("Json", true), Ok(LogFormat::Json));
    }

    #[test]
    fn test_logging_init() {
        let settings = LogSettings {
            level: LogLevel::Debug,
            format: LogFormat::Json,
            pretty: false,
            colors: false,
        };
        // We can only init once per process
        let _ = init(&settings);
        assert!(init(&settings).is_err());

        tracing::info!(name = "a", "This is an info message");
    }
}
