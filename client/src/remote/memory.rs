//! In-process remote backend for tests and offline runs.
//!
//! Enforces the same per-value limit as the hosted service and can be told
//! to hang, to fail outright, to fail only reads, or to fail writes after a
//! number of successful ones.

use super::RemoteBackend;
use crate::error::RemoteError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-value limit of the hosted remote store.
pub const DEFAULT_MAX_VALUE_LEN: usize = 4096;

#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    writes: Mutex<HashMap<String, usize>>,
    max_value_len: usize,
    hang: AtomicBool,
    unavailable: AtomicBool,
    reads_fail: AtomicBool,
    /// Successful writes left before every write fails; `usize::MAX` = unlimited
    writes_left: AtomicUsize,
    set_calls: AtomicUsize,
    get_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(HashMap::new()),
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            hang: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            reads_fail: AtomicBool::new(false),
            writes_left: AtomicUsize::new(usize::MAX),
            set_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_value_len(mut self, max: usize) -> Self {
        self.max_value_len = max;
        self
    }

    /// Every call never completes.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Every call fails immediately.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every read fails immediately; writes are unaffected.
    pub fn set_reads_fail(&self, fail: bool) {
        self.reads_fail.store(fail, Ordering::SeqCst);
    }

    /// Allow `n` more successful writes, then fail every write.
    pub fn fail_writes_after(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    /// Lift a [`fail_writes_after`](Self::fail_writes_after) limit.
    pub fn allow_writes(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Successful writes to `key` so far.
    pub fn write_count(&self, key: &str) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Store `value` directly, bypassing limits and injected failures.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries().insert(key.into(), value.into());
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn gate(&self) -> Result<(), RemoteError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }
        Ok(())
    }

    async fn read_gate(&self) -> Result<(), RemoteError> {
        self.gate().await?;
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }
        Ok(())
    }

    fn take_write(&self) -> Result<(), RemoteError> {
        let granted = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if granted {
            Ok(())
        } else {
            Err(RemoteError::Unavailable)
        }
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), RemoteError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        if value.len() > self.max_value_len {
            return Err(RemoteError::Rejected(format!(
                "value for {} is {} bytes (limit {})",
                key,
                value.len(),
                self.max_value_len
            )));
        }
        self.take_write()?;

        self.entries().insert(key.to_string(), value.to_string());
        *self
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default() += 1;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.read_gate().await?;
        Ok(self.value(key))
    }

    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, String>, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.read_gate().await?;
        let entries = self.entries();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn remove_items(&self, keys: &[String]) -> Result<(), RemoteError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let mut entries = self.entries();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_value_limit() {
        let backend = MemoryBackend::new().with_max_value_len(4);
        assert!(backend.set_item("k", "1234").await.is_ok());
        assert!(matches!(
            backend.set_item("k", "12345").await,
            Err(RemoteError::Rejected(_))
        ));
        assert_eq!(backend.value("k").as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn fails_after_budget() {
        let backend = MemoryBackend::new();
        backend.fail_writes_after(2);
        assert!(backend.set_item("a", "1").await.is_ok());
        assert!(backend.set_item("b", "2").await.is_ok());
        assert!(backend.set_item("c", "3").await.is_err());
        assert_eq!(backend.keys(), vec!["a", "b"]);

        backend.allow_writes();
        assert!(backend.set_item("c", "3").await.is_ok());
        assert_eq!(backend.write_count("c"), 1);
    }

    #[tokio::test]
    async fn failing_reads_leave_writes_alone() {
        let backend = MemoryBackend::new();
        backend.set_reads_fail(true);
        assert!(backend.set_item("a", "1").await.is_ok());
        assert!(backend.get_item("a").await.is_err());
        assert!(backend.get_items(&["a".to_string()]).await.is_err());

        backend.set_reads_fail(false);
        assert_eq!(backend.get_item("a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn batch_get_skips_missing() {
        let backend = MemoryBackend::new();
        backend.insert("a", "1");
        let values = backend
            .get_items(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["a"], "1");
    }
}
