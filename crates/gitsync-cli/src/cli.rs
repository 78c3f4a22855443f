//! CLI argument parsing using clap derive
//!
//! Every flag can also be set from the environment. Logging and config flags
//! have two names, looked up by [`Settings::resolve`] in order: the bare name
//! (`LOG_LEVEL`, `CONFIG`, ...) first, then the `GIT_SYNC_*` name. The
//! remaining flags only have the prefixed name, read by clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{CliError, Result};
use crate::logging::{LogFormat, LogLevel, LogSettings};

/// Default port of the metrics and health server
pub const DEFAULT_PORT: i64 = 9125;

/// git-sync - keep local copies of git repositories up to date
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "git-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level: panic, fatal, error, warn, info, debug or trace [default: info] [env: LOG_LEVEL, GIT_SYNC_LOG_LEVEL]
    #[arg(long, value_enum, ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Log format: json or logfmt [default: logfmt] [env: LOG_FORMAT, GIT_SYNC_LOG_FORMAT]
    #[arg(long, value_enum, ignore_case = true)]
    pub log_format: Option<LogFormat>,

    /// Multi-line human readable log output [env: LOG_PRETTY, GIT_SYNC_LOG_PRETTY]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub log_pretty: Option<bool>,

    /// Colored log output [env: LOG_COLORS, GIT_SYNC_LOG_COLORS]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub log_colors: Option<bool>,

    /// Configuration file (.yaml, .yml, .json or .toml) [env: CONFIG, GIT_SYNC_CONFIG]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serve /metrics, /ping and /health endpoints
    #[arg(long, env = "GIT_SYNC_SERVER", num_args = 0..=1, default_missing_value = "true")]
    pub server: Option<bool>,

    /// Port of the HTTP server
    #[arg(long, env = "GIT_SYNC_PORT", default_value_t = DEFAULT_PORT, allow_negative_numbers = true)]
    pub port: i64,

    /// Keep other tasks running when one task fails
    #[arg(
        long,
        env = "GIT_SYNC_ISOLATE_FAILURES",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub isolate_failures: Option<bool>,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log: LogSettings,
    pub config: PathBuf,
    pub server: bool,
    pub port: u16,
    pub isolate_failures: bool,
}

impl Settings {
    /// Fill unset flags from their environment names and apply defaults.
    ///
    /// `env` looks up an environment variable; tests pass a map.
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let level = match cli.log_level {
            Some(level) => level,
            None => parse_enum(&env, &["LOG_LEVEL", "GIT_SYNC_LOG_LEVEL"])?.unwrap_or(LogLevel::Info),
        };
        let format = match cli.log_format {
            Some(format) => format,
            None => parse_enum(&env, &["LOG_FORMAT", "GIT_SYNC_LOG_FORMAT"])?.unwrap_or(LogFormat::Logfmt),
        };
        let pretty = match cli.log_pretty {
            Some(pretty) => pretty,
            None => parse_bool(&env, &["LOG_PRETTY", "GIT_SYNC_LOG_PRETTY"])?,
        };
        let colors = match cli.log_colors {
            Some(colors) => colors,
            None => parse_bool(&env, &["LOG_COLORS", "GIT_SYNC_LOG_COLORS"])?,
        };

        let config = cli
            .config
            .or_else(|| lookup(&env, &["CONFIG", "GIT_SYNC_CONFIG"]).map(|(_, v)| PathBuf::from(v)))
            .ok_or_else(|| {
                CliError::user("a configuration file is required (--config, CONFIG or GIT_SYNC_CONFIG)")
            })?;

        let port = u16::try_from(cli.port)
            .ok()
            .filter(|port| *port >= 1)
            .ok_or_else(|| CliError::user(format!("invalid server port {}", cli.port)))?;

        Ok(Self {
            log: LogSettings {
                level,
                format,
                pretty,
                colors,
            },
            config,
            server: cli.server.unwrap_or(false),
            port,
            isolate_failures: cli.isolate_failures.unwrap_or(false),
        })
    }
}

/// First of `names` set to a non-empty value.
fn lookup<'a>(env: &impl Fn(&str) -> Option<String>, names: &[&'a str]) -> Option<(&'a str, String)> {
    names.iter().find_map(|name| {
        env(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (*name, v))
    })
}

fn parse_enum<T: ValueEnum>(env: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Result<Option<T>> {
    match lookup(env, names) {
        Some((name, value)) => T::from_str(value.trim(), true)
            .map(Some)
            .map_err(|_| CliError::user(format!("invalid value '{value}' for {name}"))),
        None => Ok(None),
    }
}

fn parse_bool(env: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Result<bool> {
    let Some((name, value)) = lookup(env, names) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(CliError::user(format!("invalid value '{value}' for {name}"))),
    }
}
