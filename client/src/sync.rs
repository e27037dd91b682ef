//! The sync engine.
//!
//! [`SyncEngine`] exclusively owns the in-memory document. Every mutation
//! is stamped and swapped into the cache synchronously, before any IO
//! starts; readers get an `Arc` of either the previous or the next document,
//! never a partial one. Writes to the durable tier and pushes to the remote
//! tier are debounced and throttled by a [`SyncPolicy`].
//!
//! ## Status
//!
//! ```text
//! Unloaded -> Loading -> Fresh | StaleLocal
//! Fresh -> Dirty (saved, write pending) -> Syncing -> Fresh | Dirty
//! ```
//!
//! ## Flush
//!
//! A flush writes the latest document to the durable store, then (when a
//! push is requested or due, no conflict is pending and the remote tier is
//! supported) uploads it as a fragment set and records the confirmed commit
//! in `last_cloud_sync`. Flushes are serialized; a save that arrives while
//! one is running is picked up by the next.

use crate::backup::BackupSink;
use crate::config::SyncConfig;
use crate::error::{ImportFailure, RemoteError, Result, SyncError, StoreError};
use crate::legacy::{FileLegacyStore, LegacyStore, NoLegacy};
use crate::local::{DurableStore, FileStore};
use crate::remote::{FragmentStore, HttpBackend, RemoteAdapter};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use vocabsync_engine::clock::{self, Clock, SystemClock};
use vocabsync_engine::{
    detect_conflict, merge_import, parse_code, Aggregate, Conflict, FragmentLayout, RemoteMeta,
    Resolution, SyncPolicy, Timestamp,
};

/// Synchronization status of the cached document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Unloaded,
    Loading,
    /// Memory matches the durable store, which is at least as new as remote
    Fresh,
    /// The remote copy is newer; a conflict awaits resolution
    StaleLocal,
    /// Saved in memory, durable write pending
    Dirty,
    /// A flush is in progress
    Syncing,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Unloaded => "unloaded",
            SyncStatus::Loading => "loading",
            SyncStatus::Fresh => "fresh",
            SyncStatus::StaleLocal => "stale-local",
            SyncStatus::Dirty => "dirty",
            SyncStatus::Syncing => "syncing",
        };
        f.write_str(s)
    }
}

/// Where a load found the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Already cached; no IO was performed
    Memory,
    Durable,
    Legacy,
    Remote,
    Defaults,
}

/// Result of [`SyncEngine::load`].
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub aggregate: Arc<Aggregate>,
    pub source: LoadSource,
    /// Remote data is materially newer; resolve with [`SyncEngine::resolve_conflict`]
    pub conflict: Option<Conflict>,
    /// The durable store could not be opened. Defaults are served and no
    /// write reaches any tier until a backup is imported or the profile is
    /// reset.
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Skipped,
    Written,
    Failed,
}

/// What a flush did on each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub durable: WriteOutcome,
    pub remote: WriteOutcome,
}

impl FlushReport {
    const SKIPPED: FlushReport = FlushReport {
        durable: WriteOutcome::Skipped,
        remote: WriteOutcome::Skipped,
    };
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    cache: Option<Arc<Aggregate>>,
    /// Bumped on every staged document
    generation: u64,
    /// Newest generation known to be in the durable store
    persisted: u64,
    /// Newest generation known to be committed remotely
    pushed: u64,
    remote_requested: bool,
    pending: Option<AbortHandle>,
    syncing: bool,
    conflict: Option<Conflict>,
    critical: bool,
    remote_meta: Option<RemoteMeta>,
}

impl State {
    fn durable_pending(&self) -> bool {
        self.generation > self.persisted
    }

    fn remote_pending(&self) -> bool {
        self.generation > self.pushed || !self.cache.as_ref().is_some_and(|c| c.is_synced())
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

struct Shared {
    durable: Arc<dyn DurableStore>,
    legacy: Arc<dyn LegacyStore>,
    remote: FragmentStore,
    clock: Arc<dyn Clock>,
    policy: SyncPolicy,
    conflict_grace_ms: u64,
    state: Mutex<State>,
    load_lock: tokio::sync::Mutex<()>,
    flush_lock: tokio::sync::Mutex<()>,
}

/// Orchestrates the memory, durable and remote tiers. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("status", &self.status())
            .field("policy", &self.shared.policy)
            .field("remote", &self.shared.remote)
            .finish()
    }
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    durable: Arc<dyn DurableStore>,
    legacy: Arc<dyn LegacyStore>,
    remote: FragmentStore,
    clock: Arc<dyn Clock>,
    policy: SyncPolicy,
    conflict_grace: Duration,
}

impl SyncEngineBuilder {
    pub fn legacy(mut self, legacy: Arc<dyn LegacyStore>) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn remote(mut self, remote: FragmentStore) -> Self {
        self.remote = remote;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn conflict_grace(mut self, grace: Duration) -> Self {
        self.conflict_grace = grace;
        self
    }

    pub fn build(self) -> SyncEngine {
        SyncEngine {
            shared: Arc::new(Shared {
                durable: self.durable,
                legacy: self.legacy,
                remote: self.remote,
                clock: self.clock,
                policy: self.policy,
                conflict_grace_ms: u64::try_from(self.conflict_grace.as_millis())
                    .unwrap_or(u64::MAX),
                state: Mutex::new(State::default()),
                load_lock: tokio::sync::Mutex::new(()),
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

impl SyncEngine {
    pub fn builder(durable: Arc<dyn DurableStore>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            durable,
            legacy: Arc::new(NoLegacy),
            remote: FragmentStore::disabled(),
            clock: Arc::new(SystemClock::new()),
            policy: SyncPolicy::default(),
            conflict_grace: Duration::from_millis(
                vocabsync_engine::conflict::DEFAULT_CONFLICT_GRACE_MS,
            ),
        }
    }

    /// File-backed engine, with an HTTP remote tier when a URL is configured.
    pub fn from_config(config: &SyncConfig) -> std::result::Result<Self, RemoteError> {
        let adapter = match &config.remote_url {
            Some(url) => RemoteAdapter::new(Arc::new(HttpBackend::new(
                url,
                config.user_id.clone(),
                config.auth_token.clone(),
            )?)),
            None => RemoteAdapter::unsupported(),
        };
        let remote = FragmentStore::new(adapter)
            .with_layout(FragmentLayout::new(config.key_prefix.clone()))
            .with_chunk_size(config.chunk_size)
            .with_codec(config.remote_codec);

        Ok(Self::builder(Arc::new(FileStore::new(config.document_path())))
            .legacy(Arc::new(FileLegacyStore::new(config.legacy_path())))
            .remote(remote)
            .policy(config.policy())
            .conflict_grace(config.conflict_grace)
            .build())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    /// Establish the session's document.
    ///
    /// Idempotent: once the cache is populated this returns it without any
    /// IO. A cold load reads the durable store; when that is empty it adopts
    /// the remote copy, then falls back to the legacy store, then to
    /// defaults. When local data exists, only the remote metadata is fetched
    /// and compared for a conflict.
    pub async fn load(&self) -> LoadOutcome {
        if let Some(outcome) = self.cached_outcome() {
            return outcome;
        }

        let _guard = self.shared.load_lock.lock().await;
        if let Some(outcome) = self.cached_outcome() {
            return outcome;
        }

        self.state().phase = Phase::Loading;
        self.cold_load().await
    }

    fn cached_outcome(&self) -> Option<LoadOutcome> {
        let st = self.state();
        let aggregate = st.cache.clone()?;
        Some(LoadOutcome {
            aggregate,
            source: LoadSource::Memory,
            conflict: st.conflict,
            critical: st.critical,
        })
    }

    async fn cold_load(&self) -> LoadOutcome {
        let shared = &self.shared;

        let local = match open_and_load(shared.durable.as_ref()).await {
            Ok(local) => local,
            Err(e) => {
                error!(error = %e, "durable store unavailable, session is critical");
                let aggregate = Arc::new(Aggregate::default());
                let mut st = self.state();
                st.phase = Phase::Ready;
                st.cache = Some(aggregate.clone());
                st.critical = true;
                return LoadOutcome {
                    aggregate,
                    source: LoadSource::Defaults,
                    conflict: None,
                    critical: true,
                };
            }
        };

        let remote_meta = shared.remote.read_meta().await;

        let (mut aggregate, source) = match local {
            Some(local) => (local, LoadSource::Durable),
            None => self.first_load(remote_meta.as_ref()).await,
        };

        let conflict = match (source, &remote_meta) {
            (LoadSource::Remote, _) | (_, None) => None,
            (_, Some(meta)) => detect_conflict(
                aggregate.last_local_update,
                meta.timestamp,
                shared.conflict_grace_ms,
            ),
        };
        if let Some(c) = &conflict {
            warn!(
                local = c.local_timestamp,
                remote = c.remote_timestamp,
                "remote progress is newer than local"
            );
        }

        // Counters roll over once per cold load; a pending conflict defers it.
        let rolled = conflict.is_none() && aggregate.roll_over_at(shared.clock.now());

        let cached = Arc::new(aggregate);
        {
            let mut st = self.state();
            st.phase = Phase::Ready;
            st.cache = Some(cached.clone());
            st.conflict = conflict;
            st.critical = false;
            st.remote_meta = remote_meta;
        }

        let aggregate = if rolled {
            debug!("daily rollover applied");
            let staged = self.stage((*cached).clone(), 0, false);
            self.schedule();
            staged
        } else {
            cached
        };

        info!(source = ?source, conflict = conflict.is_some(), "progress loaded");

        LoadOutcome {
            aggregate,
            source,
            conflict,
            critical: false,
        }
    }

    /// No durable document: remote, then legacy, then defaults.
    async fn first_load(&self, meta: Option<&RemoteMeta>) -> (Aggregate, LoadSource) {
        let shared = &self.shared;

        if let Some(meta) = meta {
            match shared.remote.download(meta).await {
                Some(doc) => {
                    info!(timestamp = meta.timestamp, "adopting remote progress on fresh install");
                    let doc = adopt(doc, meta);
                    persist(shared.durable.as_ref(), &doc).await;
                    return (doc, LoadSource::Remote);
                }
                None => warn!("remote progress exists but could not be downloaded"),
            }
        }

        if let Some(doc) = shared.legacy.load().await {
            info!("migrating progress from legacy store");
            persist(shared.durable.as_ref(), &doc).await;
            return (doc, LoadSource::Legacy);
        }

        (Aggregate::default(), LoadSource::Defaults)
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    /// Replace the document.
    ///
    /// Waits for a cold load to finish, then sets the modification stamp and
    /// swaps the cache without yielding. With `immediate`, the durable write
    /// and a remote push are awaited; otherwise both are debounced, and a
    /// push happens only once the minimum remote interval has passed.
    ///
    /// Returns the stamp given to the document.
    pub async fn save(&self, aggregate: Aggregate, immediate: bool) -> Timestamp {
        // A cold load in flight would replace the staged document.
        if self.state().phase != Phase::Ready {
            self.load().await;
        }
        let staged = self.stage(aggregate, 0, immediate);
        if immediate {
            self.state().cancel_pending();
            self.flush(false).await;
        } else {
            self.schedule();
        }
        staged.last_local_update
    }

    /// Mutate the current document in place and save it.
    pub async fn update<F>(&self, immediate: bool, f: F) -> Timestamp
    where
        F: FnOnce(&mut Aggregate),
    {
        let mut doc = (*self.load().await.aggregate).clone();
        f(&mut doc);
        self.save(doc, immediate).await
    }

    /// Cancel any pending debounce and write both tiers now.
    pub async fn force_save(&self) -> Result<FlushReport> {
        {
            let mut st = self.state();
            if st.critical {
                return Err(SyncError::Critical);
            }
            st.cancel_pending();
            st.remote_requested = true;
        }
        Ok(self.flush(true).await)
    }

    /// Run a debounced flush now instead of waiting for the timer. The
    /// remote tier is only written if a push is already requested or due.
    pub async fn flush_pending(&self) -> FlushReport {
        self.state().cancel_pending();
        self.flush(false).await
    }

    /// Stamp `aggregate` and make it the cached document.
    fn stage(&self, mut aggregate: Aggregate, floor: Timestamp, request_remote: bool) -> Arc<Aggregate> {
        let now = self.shared.clock.now();
        let mut st = self.state();

        let (previous, synced) = st
            .cache
            .as_ref()
            .map(|c| (c.last_local_update, c.last_cloud_sync))
            .unwrap_or((0, None));

        aggregate.last_local_update = clock::stamp(previous.max(floor), now);
        aggregate.last_cloud_sync = synced;

        if request_remote || self.shared.policy.remote_push_due(false, now, synced) {
            st.remote_requested = true;
        }

        let staged = Arc::new(aggregate);
        st.cache = Some(staged.clone());
        st.generation += 1;
        st.phase = Phase::Ready;
        staged
    }

    /// (Re)start the debounce timer.
    fn schedule(&self) {
        let mut st = self.state();
        if st.critical {
            return;
        }
        st.cancel_pending();

        let engine = self.clone();
        let delay = self.shared.policy.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached: a later save may abort the timer, never a running flush.
            tokio::spawn(async move {
                engine.flush(false).await;
            });
        });
        st.pending = Some(timer.abort_handle());
    }

    async fn flush(&self, force: bool) -> FlushReport {
        let _guard = self.shared.flush_lock.lock().await;

        let (snapshot, generation, write_durable, push, known) = {
            let mut st = self.state();
            if st.critical {
                debug!("critical session, writes suppressed");
                return FlushReport::SKIPPED;
            }
            let Some(snapshot) = st.cache.clone() else {
                return FlushReport::SKIPPED;
            };

            let wants_remote = std::mem::take(&mut st.remote_requested);
            let push = wants_remote
                && st.conflict.is_none()
                && self.shared.remote.is_supported()
                && (force || st.remote_pending());
            if wants_remote && st.conflict.is_some() {
                debug!("conflict pending, remote push suppressed");
            }

            let write_durable = force || st.durable_pending();
            if !write_durable && !push {
                return FlushReport::SKIPPED;
            }

            st.syncing = true;
            (snapshot, st.generation, write_durable, push, st.remote_meta.clone())
        };

        let durable = if write_durable {
            match self.shared.durable.save(&snapshot).await {
                Ok(()) => {
                    let mut st = self.state();
                    st.persisted = st.persisted.max(generation);
                    WriteOutcome::Written
                }
                Err(e) => {
                    warn!(error = %e, "durable write failed");
                    WriteOutcome::Failed
                }
            }
        } else {
            WriteOutcome::Skipped
        };

        let remote = if push {
            match self.shared.remote.upload(&snapshot, known.as_ref()).await {
                Some(meta) => {
                    self.record_commit(meta, generation).await;
                    WriteOutcome::Written
                }
                None => {
                    warn!("remote push failed, retrying in the next window");
                    self.state().remote_requested = true;
                    WriteOutcome::Failed
                }
            }
        } else {
            WriteOutcome::Skipped
        };

        self.state().syncing = false;
        FlushReport { durable, remote }
    }

    /// Stamp a confirmed remote commit onto the live document and persist it.
    async fn record_commit(&self, meta: RemoteMeta, generation: u64) {
        let (updated, current_generation) = {
            let mut st = self.state();
            st.pushed = st.pushed.max(generation);
            let committed = meta.timestamp;
            st.remote_meta = Some(meta);

            let Some(current) = st.cache.clone() else {
                return;
            };
            let mut doc = (*current).clone();
            doc.last_cloud_sync = Some(doc.last_cloud_sync.unwrap_or(0).max(committed));
            let doc = Arc::new(doc);
            st.cache = Some(doc.clone());
            (doc, st.generation)
        };

        match self.shared.durable.save(&updated).await {
            Ok(()) => {
                let mut st = self.state();
                st.persisted = st.persisted.max(current_generation);
            }
            Err(e) => warn!(error = %e, "could not record remote sync locally"),
        }
    }

    // ------------------------------------------------------------------------
    // Reset, export, import
    // ------------------------------------------------------------------------

    /// Clear every tier and start over with defaults.
    ///
    /// Fails only if the durable store cannot be cleared; remote cleanup is
    /// best-effort.
    pub async fn reset(&self) -> Result<Arc<Aggregate>> {
        self.state().cancel_pending();
        let _guard = self.shared.flush_lock.lock().await;

        self.shared
            .durable
            .clear()
            .await
            .map_err(SyncError::StorageUnavailable)?;

        let known = self.state().remote_meta.clone();
        if !self.shared.remote.purge(known.as_ref()).await {
            warn!("remote cleanup incomplete");
        }

        // Keep a document in place so the legacy store is never migrated again.
        let defaults = Arc::new(Aggregate::default());
        persist(self.shared.durable.as_ref(), &defaults).await;

        *self.state() = State {
            phase: Phase::Ready,
            cache: Some(defaults.clone()),
            ..State::default()
        };

        info!("progress reset");
        Ok(defaults)
    }

    /// A backup code for the current document.
    pub async fn export_code(&self) -> Result<String> {
        let outcome = self.load().await;
        Ok(vocabsync_engine::export_code(&outcome.aggregate)?)
    }

    /// Restore from a backup code.
    ///
    /// On failure nothing changes. On success the imported document, merged
    /// with this device's profile fields, replaces the current one and is
    /// written to every tier immediately. Clears a critical session and any
    /// pending conflict.
    pub async fn import_code(
        &self,
        code: &str,
    ) -> std::result::Result<Arc<Aggregate>, ImportFailure> {
        let imported = parse_code(code).map_err(|e| {
            warn!(error = %e, "backup code rejected");
            ImportFailure::from(e)
        })?;

        let current = self.load().await.aggregate;
        let merged = merge_import(imported, &current);

        {
            let mut st = self.state();
            if st.critical {
                info!("import ends critical session");
            }
            st.critical = false;
            st.conflict = None;
        }

        let staged = self.stage(merged, 0, true);
        self.state().cancel_pending();
        self.flush(false).await;

        info!(xp = staged.xp, words = staged.word_progress.len(), "backup imported");
        Ok(self.snapshot().unwrap_or(staged))
    }

    // ------------------------------------------------------------------------
    // Conflicts and backups
    // ------------------------------------------------------------------------

    /// Settle the conflict reported by [`load`](Self::load).
    pub async fn resolve_conflict(&self, resolution: Resolution) -> Result<Arc<Aggregate>> {
        let (conflict, current) = {
            let st = self.state();
            let conflict = st.conflict.ok_or(SyncError::NoConflict)?;
            (conflict, st.cache.clone().unwrap_or_default())
        };

        match resolution {
            Resolution::KeepLocal => {
                info!(
                    local = conflict.local_timestamp,
                    remote = conflict.remote_timestamp,
                    "keeping local progress"
                );
                self.state().conflict = None;
                let floor = conflict.remote_timestamp.saturating_add(1);
                let staged = self.stage((*current).clone(), floor, true);
                self.state().cancel_pending();
                self.flush(false).await;
                Ok(self.snapshot().unwrap_or(staged))
            }
            Resolution::AdoptRemote => {
                let remote = &self.shared.remote;
                let meta = remote.read_meta().await.ok_or(SyncError::RemoteUnavailable)?;
                let doc = remote
                    .download(&meta)
                    .await
                    .ok_or(SyncError::RemoteUnavailable)?;
                info!(timestamp = meta.timestamp, "adopting remote progress");

                self.state().cancel_pending();
                let adopted = Arc::new(adopt(doc, &meta));
                {
                    let _guard = self.shared.flush_lock.lock().await;
                    let saved = persist(self.shared.durable.as_ref(), &adopted).await;

                    let mut st = self.state();
                    st.cache = Some(adopted.clone());
                    st.conflict = None;
                    st.remote_meta = Some(meta);
                    st.remote_requested = false;
                    st.generation += 1;
                    st.pushed = st.generation;
                    if saved {
                        st.persisted = st.generation;
                    }
                }

                let mut doc = (*adopted).clone();
                if doc.roll_over_at(self.shared.clock.now()) {
                    self.stage(doc, 0, false);
                    self.schedule();
                }
                Ok(self.snapshot().unwrap_or(adopted))
            }
        }
    }

    /// Deliver a backup code to `sink` if none was made within `interval`.
    ///
    /// Returns whether a backup was delivered.
    pub async fn maybe_auto_backup(&self, sink: &dyn BackupSink, interval: Duration) -> Result<bool> {
        let outcome = self.load().await;
        if outcome.critical {
            return Ok(false);
        }

        let now = self.shared.clock.now();
        if !SyncPolicy::auto_backup_due(interval, now, outcome.aggregate.last_auto_backup) {
            return Ok(false);
        }

        let code = vocabsync_engine::export_code(&outcome.aggregate)?;
        sink.deliver(&code, now)
            .await
            .map_err(SyncError::BackupDelivery)?;

        let mut doc = (*self.snapshot().unwrap_or(outcome.aggregate)).clone();
        doc.last_auto_backup = Some(now);
        self.save(doc, false).await;

        info!(created_at = now, "auto-backup delivered");
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------------

    pub fn status(&self) -> SyncStatus {
        let st = self.state();
        match st.phase {
            Phase::Unloaded => SyncStatus::Unloaded,
            Phase::Loading => SyncStatus::Loading,
            Phase::Ready if st.syncing => SyncStatus::Syncing,
            Phase::Ready if st.conflict.is_some() => SyncStatus::StaleLocal,
            Phase::Ready if st.durable_pending() => SyncStatus::Dirty,
            Phase::Ready => SyncStatus::Fresh,
        }
    }

    /// The cached document, if loaded.
    pub fn snapshot(&self) -> Option<Arc<Aggregate>> {
        self.state().cache.clone()
    }

    pub fn conflict(&self) -> Option<Conflict> {
        self.state().conflict
    }

    pub fn is_critical(&self) -> bool {
        self.state().critical
    }

    /// Whether the remote tier is available on this installation.
    pub fn remote_supported(&self) -> bool {
        self.shared.remote.is_supported()
    }

    /// Premium entitlement of the cached document right now.
    pub fn is_entitlement_active(&self) -> bool {
        let now = self.shared.clock.now();
        self.snapshot().is_some_and(|doc| doc.is_premium_at(now))
    }
}

/// Open the store and read its document. An undecodable document counts as
/// absent so another tier can supply a good copy.
async fn open_and_load(store: &dyn DurableStore) -> std::result::Result<Option<Aggregate>, StoreError> {
    store.open().await?;
    match store.load().await {
        Err(StoreError::Corrupt(e)) => {
            error!(error = %e, "durable document is corrupt, treating it as absent");
            Ok(None)
        }
        other => other,
    }
}

/// Write `doc` to the durable store, logging failure.
async fn persist(store: &dyn DurableStore, doc: &Aggregate) -> bool {
    match store.save(doc).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "durable write failed");
            false
        }
    }
}

/// Take a remote document as this device's own: it is as new as its commit
/// and fully synced.
fn adopt(mut doc: Aggregate, meta: &RemoteMeta) -> Aggregate {
    let committed = doc.last_local_update.max(meta.timestamp);
    doc.last_local_update = committed;
    doc.last_cloud_sync = Some(committed);
    doc
}
