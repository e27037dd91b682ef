//! Error types for the VocabSync engine.

use thiserror::Error;

/// Why a transport string could not be turned back into an aggregate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input is not well-formed (bad base64, bad deflate stream, bad JSON, ...).
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The input is well-formed but is not a progress document.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("invalid fragment metadata: {0}")]
    InvalidMetadata(String),

    // Backup code errors
    #[error("backup code is empty")]
    EmptyBackup,

    #[error("unsupported backup format version: {found} (max supported: {max})")]
    UnsupportedBackupVersion { found: u32, max: u32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
