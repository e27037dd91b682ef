//! Configuration management for the server.

use std::env;

/// Largest value accepted for a single key, in bytes.
pub const DEFAULT_MAX_VALUE_LEN: usize = 4096;

/// Most keys one user may hold.
pub const DEFAULT_MAX_KEYS_PER_USER: usize = 1024;

/// Most keys accepted in one batch request.
pub const DEFAULT_MAX_BATCH_KEYS: usize = 100;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Shared bearer token; `None` allows anonymous access
    pub auth_secret: Option<String>,
    pub max_value_len: usize,
    pub max_keys_per_user: usize,
    pub max_batch_keys: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            auth_secret: None,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            max_keys_per_user: DEFAULT_MAX_KEYS_PER_USER,
            max_batch_keys: DEFAULT_MAX_BATCH_KEYS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort)?,
            Err(_) => defaults.port,
        };

        let auth_secret = env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self {
            host,
            port,
            auth_secret,
            max_value_len: limit("MAX_VALUE_LEN", defaults.max_value_len)?,
            max_keys_per_user: limit("MAX_KEYS_PER_USER", defaults.max_keys_per_user)?,
            max_batch_keys: limit("MAX_BATCH_KEYS", defaults.max_batch_keys)?,
        })
    }
}

fn limit(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidLimit(name)),
            Ok(n) => Ok(n),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("{0} must be a positive integer")]
    InvalidLimit(&'static str),
}
