//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! Server:
//! - `HOST`: bind address (default: `0.0.0.0`)
//! - `PORT`: bind port (default: `5000`)
//! - `LOG_FORMAT`: `pretty` (default) | `json`
//! - `RUST_LOG`: tracing filter
//!
//! Client:
//! - `TODO_API_URL`: base URL of the task API (default: `http://localhost:5000/api`)
//! - `TODO_DATA_DIR`: directory for the local mirror (default: `.todo-sync`)
//! - `TODO_REQUEST_TIMEOUT_MS`: per-request timeout (default: `10000`)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_DATA_DIR: &str = ".todo-sync";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A variable holds a value that cannot be used.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The name of the environment variable.
        key: &'static str,
        /// Description of why the value is invalid.
        message: String,
    },

    /// The host/port pair does not form a socket address.
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
}

// =============================================================================
// Log Format
// =============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigurationError::InvalidValue {
                key: "LOG_FORMAT",
                message: format!("expected 'pretty' or 'json', got '{other}'"),
            }),
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Settings of the REST service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Unset or blank variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `PORT` or `LOG_FORMAT` cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let host = non_blank(lookup("HOST")).unwrap_or(defaults.host);
        let port = match non_blank(lookup("PORT")) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|error| ConfigurationError::InvalidValue {
                    key: "PORT",
                    message: format!("'{value}' is not a valid port ({error})"),
                })?,
            None => defaults.port,
        };
        let log_format = match non_blank(lookup("LOG_FORMAT")) {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            host,
            port,
            log_format,
        })
    }

    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidAddress` if host and port do not
    /// form a valid address.
    pub fn socket_address(&self) -> Result<SocketAddr, ConfigurationError> {
        let text = format!("{}:{}", self.host, self.port);
        text.parse()
            .map_err(|_| ConfigurationError::InvalidAddress(text))
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Settings of the sync client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API, without the `/tasks` suffix.
    pub api_base_url: String,
    /// Directory holding the local mirror and outbox.
    pub data_dir: PathBuf,
    /// Timeout applied to each remote request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `TODO_REQUEST_TIMEOUT_MS` is not a
    /// positive integer.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let api_base_url = non_blank(lookup("TODO_API_URL"))
            .map_or(defaults.api_base_url, |url| url.trim_end_matches('/').to_string());
        let data_dir = non_blank(lookup("TODO_DATA_DIR")).map_or(defaults.data_dir, PathBuf::from);
        let request_timeout = match non_blank(lookup("TODO_REQUEST_TIMEOUT_MS")) {
            Some(value) => match value.parse::<u64>() {
                Ok(millis) if millis > 0 => Duration::from_millis(millis),
                _ => {
                    return Err(ConfigurationError::InvalidValue {
                        key: "TODO_REQUEST_TIMEOUT_MS",
                        message: format!("'{value}' is not a positive number of milliseconds"),
                    });
                }
            },
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_base_url,
            data_dir,
            request_timeout,
        })
    }
}

/// Treats empty/whitespace-only values as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
