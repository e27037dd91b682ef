//! Chunked storage of the whole document on the remote tier.
//!
//! Upload order is the correctness guarantee: chunks first, metadata last.
//! A reader that sees a metadata entry can always fetch every chunk it
//! names, and an upload that dies halfway leaves the previous commit intact.

use super::RemoteAdapter;
use futures::future::join_all;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{debug, info, warn};
use vocabsync_engine::fragment::{assemble, DEFAULT_CHUNK_SIZE, SLOT_COUNT};
use vocabsync_engine::{Aggregate, CodecKind, FragmentLayout, FragmentSet, RemoteMeta};

/// Chunks written concurrently per batch.
pub const WRITE_BATCH: usize = 10;

/// Chunks requested per batched read.
pub const READ_BATCH: usize = 20;

/// Pause between write batches.
pub const BATCH_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct FragmentStore {
    adapter: RemoteAdapter,
    layout: FragmentLayout,
    chunk_size: NonZeroUsize,
    codec: CodecKind,
}

impl FragmentStore {
    pub fn new(adapter: RemoteAdapter) -> Self {
        Self {
            adapter,
            layout: FragmentLayout::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            codec: CodecKind::Deflate,
        }
    }

    /// A store for an installation without a remote tier.
    pub fn disabled() -> Self {
        Self::new(RemoteAdapter::unsupported())
    }

    pub fn with_layout(mut self, layout: FragmentLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.adapter.is_supported()
    }

    pub fn layout(&self) -> &FragmentLayout {
        &self.layout
    }

    /// The committed metadata, or `None` if absent, unreachable or unreadable.
    pub async fn read_meta(&self) -> Option<RemoteMeta> {
        self.probe_meta().await.flatten()
    }

    /// `None` when the remote could not be asked, `Some(None)` when it
    /// answered without readable metadata.
    async fn probe_meta(&self) -> Option<Option<RemoteMeta>> {
        let key = self.layout.meta_key();
        let mut found = self.adapter.get_items(std::slice::from_ref(&key)).await?;
        let Some(raw) = found.remove(&key) else {
            return Some(None);
        };
        match RemoteMeta::from_json(&raw) {
            Ok(meta) => Some(Some(meta)),
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable remote metadata");
                Some(None)
            }
        }
    }

    /// Fetch and decode the document `meta` commits to.
    pub async fn download(&self, meta: &RemoteMeta) -> Option<Aggregate> {
        let keys = self.layout.chunk_keys(meta.slot, meta.count);
        let mut values: HashMap<String, String> = HashMap::with_capacity(keys.len());

        for batch in keys.chunks(READ_BATCH) {
            let fetched = self.adapter.get_items(batch).await?;
            values.extend(fetched);
        }

        let Some(encoded) = assemble(&self.layout, meta, &values) else {
            warn!(count = meta.count, slot = meta.slot, "remote fragment set is incomplete");
            return None;
        };

        match meta.codec.codec().decode(&encoded) {
            Ok(aggregate) => {
                debug!(count = meta.count, codec = %meta.codec, "downloaded remote document");
                Some(aggregate)
            }
            Err(e) => {
                warn!(error = %e, "remote document could not be decoded");
                None
            }
        }
    }

    /// Upload `aggregate` and commit it.
    ///
    /// `known` is the last metadata this session saw; it is used to pick the
    /// target slot only when the remote metadata cannot be read. With neither
    /// available nothing is written, since the target could be the committed
    /// slot. Returns the new commit, or `None` if anything before the commit
    /// failed.
    pub async fn upload(
        &self,
        aggregate: &Aggregate,
        known: Option<&RemoteMeta>,
    ) -> Option<RemoteMeta> {
        if !self.adapter.is_supported() {
            return None;
        }

        let committed = match self.probe_meta().await {
            Some(meta) => meta,
            None if known.is_some() => known.cloned(),
            None => {
                warn!("remote metadata unreachable, upload skipped");
                return None;
            }
        };
        let set = match FragmentSet::plan(
            &self.layout,
            aggregate,
            self.codec,
            self.chunk_size,
            committed.as_ref(),
        ) {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "could not encode document for upload");
                return None;
            }
        };

        for (i, batch) in set.chunks.chunks(WRITE_BATCH).enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
            let writes = batch
                .iter()
                .map(|(key, value)| self.adapter.set_item(key, value));
            if !join_all(writes).await.into_iter().all(|ok| ok) {
                warn!(batch = i, slot = set.meta.slot, "chunk upload failed, commit skipped");
                return None;
            }
        }

        let meta_json = match set.meta.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not encode remote metadata");
                return None;
            }
        };
        if !self.adapter.set_item(&self.layout.meta_key(), &meta_json).await {
            warn!(slot = set.meta.slot, "metadata commit failed");
            return None;
        }

        info!(
            count = set.meta.count,
            slot = set.meta.slot,
            timestamp = set.meta.timestamp,
            "remote commit"
        );

        if let Some(previous) = committed {
            if previous.slot != set.meta.slot && previous.count > 0 {
                let stale = self.layout.chunk_keys(previous.slot, previous.count);
                for batch in stale.chunks(WRITE_BATCH) {
                    if !self.adapter.remove_items(batch).await {
                        debug!(slot = previous.slot, "superseded chunks left behind");
                        break;
                    }
                }
            }
        }

        Some(set.meta)
    }

    /// Remove the committed set and anything an interrupted upload left in
    /// either slot. Metadata goes first so no reader follows it to
    /// half-deleted chunks.
    pub async fn purge(&self, known: Option<&RemoteMeta>) -> bool {
        if !self.adapter.is_supported() {
            return true;
        }

        let meta = self.probe_meta().await.unwrap_or_else(|| known.cloned());
        if !self.adapter.remove_items(&[self.layout.meta_key()]).await {
            return false;
        }

        let mut ok = true;
        for slot in 0..SLOT_COUNT {
            let committed = meta
                .as_ref()
                .filter(|m| m.slot == slot)
                .map_or(0, |m| m.count);
            for batch in self.layout.chunk_keys(slot, committed).chunks(WRITE_BATCH) {
                ok &= self.adapter.remove_items(batch).await;
            }
            ok &= self.sweep(slot, committed).await;
        }
        ok
    }

    /// Remove chunks of `slot` from index `from` on. Uploads write in
    /// batches and stop at the first failed one, so a whole empty read
    /// window means nothing further was written.
    async fn sweep(&self, slot: u8, from: usize) -> bool {
        let mut start = from;
        loop {
            let window: Vec<String> = (start..start + READ_BATCH)
                .map(|i| self.layout.chunk_key(slot, i))
                .collect();
            let Some(found) = self.adapter.get_items(&window).await else {
                return false;
            };
            if found.is_empty() {
                return true;
            }
            let leftover: Vec<String> = found.into_keys().collect();
            if !self.adapter.remove_items(&leftover).await {
                return false;
            }
            debug!(slot, count = leftover.len(), "removed leftover chunks");
            start += READ_BATCH;
        }
    }
}
