//! Error types for the sync client.
//!
//! Only [`SyncError`] and [`ImportFailure`] cross the public [`SyncEngine`]
//! API. Storage-tier errors are logged and converted at the component
//! boundary.
//!
//! [`SyncEngine`]: crate::SyncEngine

use thiserror::Error;
use vocabsync_engine::DecodeError;

/// Durable local store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),

    #[error("timed out opening durable store")]
    OpenTimeout,

    #[error("stored document is unreadable: {0}")]
    Corrupt(#[from] DecodeError),

    #[error("encoding failed: {0}")]
    Encode(#[from] vocabsync_engine::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote key-value backend failures.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned status {0}")]
    Status(u16),

    #[error("remote rejected the request: {0}")]
    Rejected(String),

    #[error("remote backend unavailable")]
    Unavailable,
}

/// Typed failures of the public sync API.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote storage is unavailable, try again later")]
    RemoteUnavailable,

    #[error("there is no conflict to resolve")]
    NoConflict,

    #[error("local storage is unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("local storage could not be opened this session; import a backup code or reset")]
    Critical,

    #[error("could not encode progress: {0}")]
    Engine(#[from] vocabsync_engine::Error),

    #[error("backup delivery failed: {0}")]
    BackupDelivery(#[source] std::io::Error),
}

/// Why a backup code was rejected. The current document is left untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ImportFailure {
    #[error("the backup code is empty")]
    Empty,

    #[error("the backup code could not be read, check that it was copied completely")]
    Undecodable,

    #[error("this code is not a progress backup")]
    SchemaMismatch,
}

impl From<vocabsync_engine::Error> for ImportFailure {
    fn from(err: vocabsync_engine::Error) -> Self {
        use vocabsync_engine::Error;

        match err {
            Error::EmptyBackup => ImportFailure::Empty,
            Error::Decode(DecodeError::SchemaMismatch(_)) => ImportFailure::SchemaMismatch,
            Error::Decode(DecodeError::Malformed(_))
            | Error::UnsupportedBackupVersion { .. }
            | Error::Encode(_)
            | Error::InvalidMetadata(_) => ImportFailure::Undecodable,
        }
    }
}

/// Result type for the public sync API.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_failure_mapping() {
        use vocabsync_engine::Error;

        assert_eq!(ImportFailure::from(Error::EmptyBackup), ImportFailure::Empty);
        assert_eq!(
            ImportFailure::from(Error::Decode(DecodeError::SchemaMismatch("xp".into()))),
            ImportFailure::SchemaMismatch
        );
        assert_eq!(
            ImportFailure::from(Error::Decode(DecodeError::Malformed("base64".into()))),
            ImportFailure::Undecodable
        );
        assert_eq!(
            ImportFailure::from(Error::UnsupportedBackupVersion { found: 9, max: 5 }),
            ImportFailure::Undecodable
        );
    }

    #[test]
    fn messages_are_short_and_plain() {
        for failure in [
            ImportFailure::Empty,
            ImportFailure::Undecodable,
            ImportFailure::SchemaMismatch,
        ] {
            let msg = failure.to_string();
            assert!(msg.len() < 80);
            assert!(!msg.contains("base64"));
        }
    }

    #[test]
    fn storage_error_display() {
        let err = SyncError::StorageUnavailable(StoreError::OpenTimeout);
        assert_eq!(
            err.to_string(),
            "local storage is unavailable: timed out opening durable store"
        );
    }
}
