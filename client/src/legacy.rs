//! Read-only access to the flat store used by early releases.
//!
//! Consulted once, only when both the durable store and the remote tier are
//! empty. Anything unreadable is treated as absent.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;
use vocabsync_engine::{Aggregate, Codec, JsonCodec};

#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn load(&self) -> Option<Aggregate>;
}

/// No legacy data on this installation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegacy;

#[async_trait]
impl LegacyStore for NoLegacy {
    async fn load(&self) -> Option<Aggregate> {
        None
    }
}

/// A single file holding the previous-format JSON document.
#[derive(Debug, Clone)]
pub struct FileLegacyStore {
    path: PathBuf,
}

impl FileLegacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LegacyStore for FileLegacyStore {
    async fn load(&self) -> Option<Aggregate> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "legacy store unreadable");
                return None;
            }
        };

        match JsonCodec.decode(&text) {
            Ok(aggregate) => Some(aggregate),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "legacy document rejected");
                None
            }
        }
    }
}
