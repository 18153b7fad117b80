//! Runtime configuration.
//!
//! Settings come from environment variables, falling back to defaults that
//! match the bundled query server:
//!
//! | Variable                | Default                    |
//! |-------------------------|----------------------------|
//! | `MATRIZ_ENDPOINT`       | `ws://localhost:4000/ws`   |
//! | `MATRIZ_RECONNECT_SECS` | `3`                        |
//! | `MATRIZ_MATRIX_FUNCTOR` | `matriz`                   |
//! | `MATRIZ_SERVER_CMD`     | unset (server not spawned) |
//! | `MATRIZ_LOG_FILE`       | `<cache dir>/matriz/matriz.log` |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::connection::{DEFAULT_RECONNECT_DELAY, MAX_RECONNECT_DELAY};
use crate::term::MATRIX_FUNCTOR;

/// Default query server endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:4000/ws";

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid endpoint '{value}': {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Endpoint '{0}' must use the ws:// or wss:// scheme")]
    UnsupportedScheme(String),

    #[error("Invalid reconnect delay '{0}': expected a positive number of seconds, at most one day")]
    InvalidDelay(String),

    #[error("Matrix functor must not be empty")]
    EmptyFunctor,
}

/// Resolved console configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// WebSocket URL of the query server.
    pub endpoint: Url,
    /// Flat delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Functor tagging matrix payloads in responses.
    pub matrix_functor: String,
    /// Command that starts the query server, if the console should own it.
    pub server_command: Option<String>,
    /// Destination of the tracing log.
    pub log_file: PathBuf,
}

impl Config {
    pub const ENDPOINT_ENV: &'static str = "MATRIZ_ENDPOINT";
    pub const RECONNECT_ENV: &'static str = "MATRIZ_RECONNECT_SECS";
    pub const MATRIX_FUNCTOR_ENV: &'static str = "MATRIZ_MATRIX_FUNCTOR";
    pub const SERVER_CMD_ENV: &'static str = "MATRIZ_SERVER_CMD";
    pub const LOG_FILE_ENV: &'static str = "MATRIZ_LOG_FILE";

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = parse_endpoint(
            get(Self::ENDPOINT_ENV)
                .as_deref()
                .unwrap_or(DEFAULT_ENDPOINT),
        )?;

        let reconnect_delay = match get(Self::RECONNECT_ENV) {
            Some(value) => parse_delay(&value)?,
            None => DEFAULT_RECONNECT_DELAY,
        };

        let matrix_functor = match lookup(Self::MATRIX_FUNCTOR_ENV) {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::EmptyFunctor),
            Some(value) => value.trim().to_string(),
            None => MATRIX_FUNCTOR.to_string(),
        };

        let log_file = get(Self::LOG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_log_file);

        Ok(Self {
            endpoint,
            reconnect_delay,
            matrix_functor,
            server_command: get(Self::SERVER_CMD_ENV),
            log_file,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            matrix_functor: MATRIX_FUNCTOR.to_string(),
            server_command: None,
            log_file: default_log_file(),
        }
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidEndpoint {
        value: value.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(value.to_string())),
    }
}

fn parse_delay(value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .filter(|delay| *delay <= MAX_RECONNECT_DELAY)
        .ok_or_else(|| ConfigError::InvalidDelay(value.to_string()))
}

/// Resolve the default tracing log location.
///
/// Resolution order:
/// 1. `<cache dir>/matriz/matriz.log` (XDG cache on Linux, Library/Caches on macOS)
/// 2. `<temp dir>/matriz.log` (fallback)
pub fn default_log_file() -> PathBuf {
    match dirs::cache_dir() {
        Some(cache_dir) => cache_dir.join("matriz").join("matriz.log"),
        None => std::env::temp_dir().join("matriz.log"),
    }
}
