//! Remote tier.
//!
//! A [`RemoteBackend`] is the raw key-value API. The [`RemoteAdapter`] wraps
//! it with the guarantees the sync layer relies on: every call is bounded by
//! a deadline and resolves to a fallback value instead of an error, and the
//! whole tier can be switched off by a capability probe.

pub mod fragments;
pub mod http;
pub mod memory;

pub use fragments::FragmentStore;
pub use http::HttpBackend;
pub use memory::MemoryBackend;

use crate::error::RemoteError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Deadline for single-key calls.
pub const SINGLE_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for batched reads.
pub const BATCH_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw remote key-value API.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), RemoteError>;

    /// `None` when the key does not exist.
    async fn get_item(&self, key: &str) -> Result<Option<String>, RemoteError>;

    /// Values of the keys that exist; missing keys are simply absent.
    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, String>, RemoteError>;

    async fn remove_items(&self, keys: &[String]) -> Result<(), RemoteError>;
}

/// Version of the host environment providing the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostVersion {
    /// First host version with cloud storage.
    pub const CLOUD_STORAGE: HostVersion = HostVersion { major: 6, minor: 9 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn supports_cloud_storage(&self) -> bool {
        *self >= Self::CLOUD_STORAGE
    }
}

impl FromStr for HostVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |what: &str| -> Result<u32, String> {
            match parts.next() {
                None | Some("") => Ok(0),
                Some(p) => p
                    .parse()
                    .map_err(|_| format!("invalid {} version in {:?}", what, s)),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Deadline-bounded, capability-gated access to a [`RemoteBackend`].
///
/// No method returns an error: failures and timeouts become `false` or
/// `None`, and `None` means "treat as absent", not "definitely absent".
#[derive(Clone)]
pub struct RemoteAdapter {
    backend: Option<Arc<dyn RemoteBackend>>,
    single_timeout: Duration,
    batch_timeout: Duration,
}

impl fmt::Debug for RemoteAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAdapter")
            .field("supported", &self.is_supported())
            .field("single_timeout", &self.single_timeout)
            .field("batch_timeout", &self.batch_timeout)
            .finish()
    }
}

impl RemoteAdapter {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend: Some(backend),
            single_timeout: SINGLE_OP_TIMEOUT,
            batch_timeout: BATCH_OP_TIMEOUT,
        }
    }

    /// An adapter that is supported only when `host` provides cloud storage.
    pub fn for_host(backend: Arc<dyn RemoteBackend>, host: Option<HostVersion>) -> Self {
        match host {
            Some(version) if version.supports_cloud_storage() => Self::new(backend),
            _ => Self::unsupported(),
        }
    }

    /// The remote tier is absent; every call resolves to its fallback at once.
    pub fn unsupported() -> Self {
        Self {
            backend: None,
            single_timeout: SINGLE_OP_TIMEOUT,
            batch_timeout: BATCH_OP_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, single: Duration, batch: Duration) -> Self {
        self.single_timeout = single;
        self.batch_timeout = batch;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn set_item(&self, key: &str, value: &str) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        bounded("set_item", key, self.single_timeout, backend.set_item(key, value))
            .await
            .is_some()
    }

    pub async fn get_item(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        bounded("get_item", key, self.single_timeout, backend.get_item(key))
            .await
            .flatten()
    }

    pub async fn get_items(&self, keys: &[String]) -> Option<HashMap<String, String>> {
        let backend = self.backend.as_ref()?;
        let first = keys.first().map(String::as_str).unwrap_or_default();
        bounded("get_items", first, self.batch_timeout, backend.get_items(keys)).await
    }

    /// Best-effort removal.
    pub async fn remove_items(&self, keys: &[String]) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        if keys.is_empty() {
            return true;
        }
        bounded("remove_items", &keys[0], self.single_timeout, backend.remove_items(keys))
            .await
            .is_some()
    }
}

/// Race `op` against `limit`, logging and swallowing failures.
async fn bounded<T, F>(op: &'static str, key: &str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(op, key = %key, error = %e, "remote call failed");
            None
        }
        Err(_) => {
            warn!(op, key = %key, timeout_ms = limit.as_millis() as u64, "remote call timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_version_probe() {
        assert!("6.9".parse::<HostVersion>().unwrap().supports_cloud_storage());
        assert!("7.0".parse::<HostVersion>().unwrap().supports_cloud_storage());
        assert!("6.10".parse::<HostVersion>().unwrap().supports_cloud_storage());
        assert!(!"6.2".parse::<HostVersion>().unwrap().supports_cloud_storage());
        assert!(!"6".parse::<HostVersion>().unwrap().supports_cloud_storage());
        assert!("six".parse::<HostVersion>().is_err());
        assert_eq!(HostVersion::new(6, 9).to_string(), "6.9");
    }

    #[tokio::test]
    async fn unsupported_adapter_falls_back() {
        let adapter = RemoteAdapter::unsupported();
        assert!(!adapter.is_supported());
        assert!(!adapter.set_item("k", "v").await);
        assert_eq!(adapter.get_item("k").await, None);
        assert_eq!(adapter.get_items(&["k".to_string()]).await, None);
        assert!(!adapter.remove_items(&["k".to_string()]).await);
    }

    #[tokio::test]
    async fn old_host_disables_remote() {
        let backend = Arc::new(MemoryBackend::new());
        assert!(!RemoteAdapter::for_host(backend.clone(), Some(HostVersion::new(6, 0))).is_supported());
        assert!(!RemoteAdapter::for_host(backend.clone(), None).is_supported());
        assert!(RemoteAdapter::for_host(backend, Some(HostVersion::new(6, 9))).is_supported());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_hang(true);
        let adapter = RemoteAdapter::new(backend);

        let started = tokio::time::Instant::now();
        assert!(!adapter.set_item("k", "v").await);
        assert!(started.elapsed() >= SINGLE_OP_TIMEOUT);
        assert!(started.elapsed() < BATCH_OP_TIMEOUT);

        let started = tokio::time::Instant::now();
        assert_eq!(adapter.get_items(&["a".to_string(), "b".to_string()]).await, None);
        assert!(started.elapsed() >= BATCH_OP_TIMEOUT);
    }

    #[tokio::test]
    async fn backend_errors_become_fallbacks() {
        let backend = Arc::new(MemoryBackend::new());
        let adapter = RemoteAdapter::new(backend.clone());

        assert!(adapter.set_item("k", "v").await);
        assert_eq!(adapter.get_item("k").await.as_deref(), Some("v"));

        backend.set_unavailable(true);
        assert!(!adapter.set_item("k", "w").await);
        assert_eq!(adapter.get_item("k").await, None);
    }
}
