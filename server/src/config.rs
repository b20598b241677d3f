//! Configuration management for the store and notifier.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use torgi_engine::schedule::{DEFAULT_UTC_OFFSET_HOURS, MAX_UTC_OFFSET_HOURS};
use torgi_engine::Timing;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Chat or channel that receives auction notifications; the notifier is
    /// not started without one.
    pub notification_destination: Option<i64>,
    /// Lead window, UTC offset and idle poll of the notifier
    pub timing: Timing,
    /// How long a change signal waits for the notifier before giving up
    pub reload_grace: Duration,
    /// Records whose auction is older than this many months are purged on
    /// startup
    pub retention_months: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = parse(&lookup, "DB_MAX_CONNECTIONS", 10u32)?;
        let notification_destination = match lookup("NOTIFICATION_DESTINATION") {
            Some(raw) => Some(parse_value("NOTIFICATION_DESTINATION", &raw)?),
            None => None,
        };

        let timing = Timing {
            lead_window: duration(&lookup, "NOTIFY_LEAD_MINUTES", 10, 60)?,
            utc_offset: utc_offset(&lookup)?,
            idle_poll: duration(&lookup, "IDLE_POLL_HOURS", 24, 60 * 60)?,
        };
        let reload_grace = Duration::from_secs(parse(&lookup, "RELOAD_GRACE_SECS", 3u64)?);
        let retention_months = parse(&lookup, "RETENTION_MONTHS", 2u32)?;

        Ok(Self {
            database_url,
            max_connections,
            notification_destination,
            timing,
            reload_grace,
            retention_months,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

/// A whole number of `unit` seconds.
fn duration<F>(
    lookup: &F,
    name: &'static str,
    default: u64,
    unit: u64,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let n: u64 = parse(lookup, name, default)?;
    n.checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid(lookup, name, n))
}

/// Signed whole hours, east of UTC positive.
fn utc_offset<F>(lookup: &F) -> Result<chrono::Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const NAME: &str = "UTC_OFFSET_HOURS";
    let hours: i64 = parse(lookup, NAME, DEFAULT_UTC_OFFSET_HOURS)?;
    if !(-MAX_UTC_OFFSET_HOURS..=MAX_UTC_OFFSET_HOURS).contains(&hours) {
        return Err(invalid(lookup, NAME, hours));
    }
    Ok(chrono::Duration::hours(hours))
}

fn invalid<F>(lookup: &F, name: &'static str, parsed: impl ToString) -> ConfigError
where
    F: Fn(&str) -> Option<String>,
{
    ConfigError::Invalid {
        name,
        value: lookup(name).unwrap_or_else(|| parsed.to_string()),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid {name} value: {value:?}")]
    Invalid { name: &'static str, value: String },
}
