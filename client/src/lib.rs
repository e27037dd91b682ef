//! # VocabSync client
//!
//! Keeps a learner's progress document consistent across three tiers:
//!
//! - **memory**: the session's authoritative copy, owned by [`SyncEngine`]
//! - **durable local**: a single document that survives restarts ([`DurableStore`])
//! - **remote**: a size-limited key-value service, written as a chunked,
//!   double-buffered fragment set ([`FragmentStore`])
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vocabsync_client::{MemoryStore, SyncEngine};
//!
//! # async fn run() {
//! let engine = SyncEngine::builder(Arc::new(MemoryStore::new())).build();
//!
//! let loaded = engine.load().await;
//! println!("xp: {}", loaded.aggregate.xp);
//!
//! engine.update(false, |doc| doc.xp += 10).await;
//! let code = engine.export_code().await.unwrap();
//! assert!(code.starts_with("VM5:"));
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod legacy;
pub mod local;
pub mod remote;
pub mod sync;

pub use backup::{BackupSink, FileBackupSink, MemorySink};
pub use config::{ConfigError, SyncConfig};
pub use error::{ImportFailure, RemoteError, Result, StoreError, SyncError};
pub use legacy::{FileLegacyStore, LegacyStore, NoLegacy};
pub use local::{DurableStore, FileStore, MemoryStore};
pub use remote::{FragmentStore, HostVersion, HttpBackend, MemoryBackend, RemoteAdapter, RemoteBackend};
pub use sync::{FlushReport, LoadOutcome, LoadSource, SyncEngine, SyncEngineBuilder, SyncStatus, WriteOutcome};

pub use vocabsync_engine::{Aggregate, Conflict, Resolution};
