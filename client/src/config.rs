//! Configuration management for the sync client.

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use vocabsync_engine::codec::CodecKind;
use vocabsync_engine::conflict::DEFAULT_CONFLICT_GRACE_MS;
use vocabsync_engine::fragment::{DEFAULT_CHUNK_SIZE, DEFAULT_KEY_PREFIX};
use vocabsync_engine::policy::{DEFAULT_DEBOUNCE, DEFAULT_MIN_REMOTE_INTERVAL};
use vocabsync_engine::SyncPolicy;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding the durable document
    pub data_dir: PathBuf,
    /// Base URL of the remote key-value service; remote sync is off without it
    pub remote_url: Option<String>,
    /// Account the remote entries belong to
    pub user_id: String,
    /// Bearer token for the remote service
    pub auth_token: Option<String>,
    /// Prefix of every remote key
    pub key_prefix: String,
    /// Quiet period collapsing bursts of saves
    pub debounce: Duration,
    /// Minimum interval between unrequested remote pushes
    pub min_remote_interval: Duration,
    /// Remote lead tolerated before a conflict is reported
    pub conflict_grace: Duration,
    /// Maximum bytes per remote chunk
    pub chunk_size: NonZeroUsize,
    /// Encoding of remote chunks
    pub remote_codec: CodecKind,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vocabsync"),
            remote_url: None,
            user_id: "local".to_string(),
            auth_token: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            min_remote_interval: DEFAULT_MIN_REMOTE_INTERVAL,
            conflict_grace: Duration::from_millis(DEFAULT_CONFLICT_GRACE_MS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            remote_codec: CodecKind::Deflate,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup("VOCABSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let remote_url = lookup("VOCABSYNC_REMOTE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        let user_id = lookup("VOCABSYNC_USER_ID").unwrap_or(defaults.user_id);
        let auth_token = lookup("VOCABSYNC_AUTH_TOKEN").filter(|t| !t.is_empty());
        let key_prefix = lookup("VOCABSYNC_KEY_PREFIX").unwrap_or(defaults.key_prefix);

        let debounce = match parse::<u64>(&lookup, "VOCABSYNC_DEBOUNCE_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.debounce,
        };
        let min_remote_interval = match parse::<u64>(&lookup, "VOCABSYNC_REMOTE_INTERVAL_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.min_remote_interval,
        };
        let conflict_grace = match parse::<u64>(&lookup, "VOCABSYNC_CONFLICT_GRACE_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.conflict_grace,
        };
        let chunk_size = match parse::<usize>(&lookup, "VOCABSYNC_CHUNK_SIZE")? {
            Some(size) => NonZeroUsize::new(size).ok_or(ConfigError::ZeroChunkSize)?,
            None => defaults.chunk_size,
        };
        let remote_codec = match lookup("VOCABSYNC_REMOTE_CODEC") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidCodec(raw.clone()))?,
            None => defaults.remote_codec,
        };

        Ok(Self {
            data_dir,
            remote_url,
            user_id,
            auth_token,
            key_prefix,
            debounce,
            min_remote_interval,
            conflict_grace,
            chunk_size,
            remote_codec,
        })
    }

    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy::new(self.debounce, self.min_remote_interval)
    }

    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join("progress.json")
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.key_prefix))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("VOCABSYNC_CHUNK_SIZE must be at least 1")]
    ZeroChunkSize,

    #[error("Unknown VOCABSYNC_REMOTE_CODEC: {0} (expected json or deflate)")]
    InvalidCodec(String),
}
