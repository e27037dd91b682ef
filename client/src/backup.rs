//! Destinations for automatic backup codes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use vocabsync_engine::Timestamp;

/// Somewhere a backup code can be delivered to.
#[async_trait]
pub trait BackupSink: Send + Sync {
    async fn deliver(&self, code: &str, created_at: Timestamp) -> std::io::Result<()>;
}

/// Writes each code to `<dir>/backup-<created_at>.txt`.
#[derive(Debug, Clone)]
pub struct FileBackupSink {
    dir: PathBuf,
}

impl FileBackupSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, created_at: Timestamp) -> PathBuf {
        self.dir.join(format!("backup-{}.txt", created_at))
    }
}

#[async_trait]
impl BackupSink for FileBackupSink {
    async fn deliver(&self, code: &str, created_at: Timestamp) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(created_at), code).await
    }
}

/// Keeps delivered codes in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<(Timestamp, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(Timestamp, String)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BackupSink for MemorySink {
    async fn deliver(&self, code: &str, created_at: Timestamp) -> std::io::Result<()> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((created_at, code.to_string()));
        Ok(())
    }
}
