//! Durable local store.
//!
//! A single slot holding the latest whole document. It is the fast,
//! always-written tier: every flush lands here before the remote tier is
//! touched.

use crate::error::StoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::fs;
use tracing::debug;
use vocabsync_engine::{Aggregate, Codec, JsonCodec};

/// Upper bound on acquiring the store at session start.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// Process-surviving storage for the document.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Acquire the store. Called once at the start of every cold load.
    async fn open(&self) -> Result<(), StoreError>;

    /// The stored document, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Aggregate>, StoreError>;

    /// Replace the stored document.
    async fn save(&self, aggregate: &Aggregate) -> Result<(), StoreError>;

    /// Remove the stored document.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON document in a file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    open_timeout: Duration,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            open_timeout: OPEN_TIMEOUT,
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn open(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => return Ok(()),
        };

        tokio::time::timeout(self.open_timeout, fs::create_dir_all(&dir))
            .await
            .map_err(|_| StoreError::OpenTimeout)??;

        let meta = fs::metadata(&dir).await?;
        if meta.permissions().readonly() {
            return Err(StoreError::Unavailable(format!(
                "{} is read-only",
                dir.display()
            )));
        }
        Ok(())
    }

    async fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let aggregate = JsonCodec.decode(&text)?;
        debug!(path = %self.path.display(), "loaded durable document");
        Ok(Some(aggregate))
    }

    async fn save(&self, aggregate: &Aggregate) -> Result<(), StoreError> {
        let json = JsonCodec.encode(aggregate)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store with failure injection and call counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<Aggregate>>,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(aggregate: Aggregate) -> Self {
        let store = Self::default();
        *store.slot() = Some(aggregate);
        store
    }

    /// A store whose `open` always fails.
    pub fn failing_open() -> Self {
        let store = Self::default();
        store.fail_open.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn document(&self) -> Option<Aggregate> {
        self.slot().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Aggregate>> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn open(&self) -> Result<(), StoreError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("open failed".into()));
        }
        Ok(())
    }

    async fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.slot().clone())
    }

    async fn save(&self, aggregate: &Aggregate) -> Result<(), StoreError> {
        self.check_writable()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.slot() = Some(aggregate.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.check_writable()?;
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/progress.json"));
        store.open().await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);

        let agg = Aggregate {
            xp: 77,
            user_name: "Дарья".into(),
            ..Default::default()
        };
        store.save(&agg).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(agg));
        assert!(!store.temp_path().exists());

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn file_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{\"xp\": ").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn file_store_open_fails_on_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileStore::new(blocker.join("progress.json"));
        assert!(store.open().await.is_err());
    }

    #[tokio::test]
    async fn memory_store_injection() {
        let store = MemoryStore::failing_open();
        assert!(store.open().await.is_err());

        let store = MemoryStore::new();
        store.save(&Aggregate::default()).await.unwrap();
        store.set_fail_writes(true);
        assert!(store.save(&Aggregate::default()).await.is_err());
        assert_eq!(store.saves(), 1);
        assert!(store.document().is_some());
    }
}
