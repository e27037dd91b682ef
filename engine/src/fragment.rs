//! Remote fragment set: naming and metadata.
//!
//! An aggregate is stored remotely as N chunk entries plus one metadata
//! entry. The metadata is the commit marker: it is written last on upload
//! and read first on download, so it never points at chunks that do not
//! exist yet.
//!
//! Chunks live in one of two slots. An upload always fills the slot the
//! committed metadata does *not* reference, so an interrupted upload leaves
//! the previously committed set intact even when chunk indexes overlap.
//!
//! Metadata written before slots and codecs existed (`{"count", "timestamp"}`)
//! reads as slot 0 with the JSON codec.

use crate::chunk;
use crate::codec::CodecKind;
use crate::error::{Error, Result};
use crate::{Aggregate, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Default remote key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "vocabmaster_user_v5_ru";

/// Default fragment size in bytes (remote per-key limit is 4096).
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(2500) {
    Some(n) => n,
    None => unreachable!(),
};

/// Number of chunk slots.
pub const SLOT_COUNT: u8 = 2;

/// Remote metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMeta {
    /// Number of chunks in the committed set
    pub count: usize,
    /// `last_local_update` of the committed aggregate
    pub timestamp: Timestamp,
    /// Slot holding the committed chunks
    #[serde(default)]
    pub slot: u8,
    /// Codec the chunks were encoded with
    #[serde(default)]
    pub codec: CodecKind,
}

impl RemoteMeta {
    /// The slot the next upload should write into.
    pub fn next_slot(&self) -> u8 {
        (self.slot + 1) % SLOT_COUNT
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidMetadata(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let meta: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidMetadata(e.to_string()))?;

        if meta.slot >= SLOT_COUNT {
            return Err(Error::InvalidMetadata(format!(
                "unknown slot: {} (slots: {})",
                meta.slot, SLOT_COUNT
            )));
        }

        Ok(meta)
    }
}

/// Key naming for one fragment set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentLayout {
    prefix: String,
}

impl Default for FragmentLayout {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl FragmentLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn meta_key(&self) -> String {
        format!("{}_meta", self.prefix)
    }

    /// Slot 0 keeps the historical `<prefix>_chunk_<i>` names.
    pub fn chunk_key(&self, slot: u8, index: usize) -> String {
        match slot {
            0 => format!("{}_chunk_{}", self.prefix, index),
            s => format!("{}_chunk{}_{}", self.prefix, s, index),
        }
    }

    pub fn chunk_keys(&self, slot: u8, count: usize) -> Vec<String> {
        (0..count).map(|i| self.chunk_key(slot, i)).collect()
    }

    /// Metadata key followed by every chunk key the metadata references.
    pub fn committed_keys(&self, meta: &RemoteMeta) -> Vec<String> {
        let mut keys = Vec::with_capacity(meta.count + 1);
        keys.push(self.meta_key());
        keys.extend(self.chunk_keys(meta.slot, meta.count));
        keys
    }
}

/// A fragment set ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSet {
    /// `(key, value)` pairs in index order
    pub chunks: Vec<(String, String)>,
    /// Metadata to commit after every chunk is stored
    pub meta: RemoteMeta,
}

impl FragmentSet {
    /// Encode and split `aggregate`, targeting the slot after `committed`.
    pub fn plan(
        layout: &FragmentLayout,
        aggregate: &Aggregate,
        codec: CodecKind,
        chunk_size: NonZeroUsize,
        committed: Option<&RemoteMeta>,
    ) -> Result<Self> {
        let encoded = codec.codec().encode(aggregate)?;
        let slot = committed.map(RemoteMeta::next_slot).unwrap_or(0);

        let chunks: Vec<(String, String)> = chunk::split(&encoded, chunk_size)
            .into_iter()
            .enumerate()
            .map(|(i, value)| (layout.chunk_key(slot, i), value))
            .collect();

        let meta = RemoteMeta {
            count: chunks.len(),
            timestamp: aggregate.last_local_update,
            slot,
            codec,
        };

        Ok(Self { chunks, meta })
    }
}

/// Reassemble the transport string a metadata entry references.
///
/// Returns `None` if any chunk is missing from `values`.
pub fn assemble(
    layout: &FragmentLayout,
    meta: &RemoteMeta,
    values: &HashMap<String, String>,
) -> Option<String> {
    let mut parts = Vec::with_capacity(meta.count);
    for key in layout.chunk_keys(meta.slot, meta.count) {
        parts.push(values.get(&key)?);
    }
    Some(chunk::join(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(slot: u8, count: usize) -> RemoteMeta {
        RemoteMeta {
            count,
            timestamp: 1_000,
            slot,
            codec: CodecKind::Deflate,
        }
    }

    #[test]
    fn key_names() {
        let layout = FragmentLayout::new("p");
        assert_eq!(layout.meta_key(), "p_meta");
        assert_eq!(layout.chunk_key(0, 3), "p_chunk_3");
        assert_eq!(layout.chunk_key(1, 3), "p_chunk1_3");
        assert_eq!(
            layout.committed_keys(&meta(1, 2)),
            vec!["p_meta", "p_chunk1_0", "p_chunk1_1"]
        );
    }

    #[test]
    fn legacy_metadata_reads_as_slot_zero_json() {
        let meta = RemoteMeta::from_json(r#"{"count": 3, "timestamp": 1706745600000}"#).unwrap();
        assert_eq!(meta.slot, 0);
        assert_eq!(meta.codec, CodecKind::Json);
        assert_eq!(meta.next_slot(), 1);
    }

    #[test]
    fn metadata_roundtrip_and_validation() {
        let m = meta(1, 7);
        let parsed = RemoteMeta::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(parsed, m);
        assert_eq!(parsed.next_slot(), 0);

        let bad = RemoteMeta::from_json(r#"{"count": 1, "timestamp": 1, "slot": 7}"#);
        assert!(matches!(bad, Err(Error::InvalidMetadata(_))));
        let bad = RemoteMeta::from_json("not json");
        assert!(matches!(bad, Err(Error::InvalidMetadata(_))));
    }

    #[test]
    fn plan_alternates_slots() {
        let layout = FragmentLayout::default();
        let agg = Aggregate {
            xp: 5,
            last_local_update: 42,
            ..Default::default()
        };
        let size = NonZeroUsize::new(16).unwrap();

        let first = FragmentSet::plan(&layout, &agg, CodecKind::Json, size, None).unwrap();
        assert_eq!(first.meta.slot, 0);
        assert_eq!(first.meta.timestamp, 42);
        assert_eq!(first.meta.count, first.chunks.len());
        assert!(first.chunks[0].0.ends_with("_chunk_0"));

        let second =
            FragmentSet::plan(&layout, &agg, CodecKind::Json, size, Some(&first.meta)).unwrap();
        assert_eq!(second.meta.slot, 1);
        assert!(second.chunks[0].0.ends_with("_chunk1_0"));
    }

    #[test]
    fn assemble_requires_every_chunk() {
        let layout = FragmentLayout::default();
        let agg = Aggregate {
            user_name: "Анна".into(),
            ..Default::default()
        };
        let set = FragmentSet::plan(
            &layout,
            &agg,
            CodecKind::Deflate,
            NonZeroUsize::new(8).unwrap(),
            None,
        )
        .unwrap();

        let mut values: HashMap<String, String> = set.chunks.iter().cloned().collect();
        let joined = assemble(&layout, &set.meta, &values).unwrap();
        assert_eq!(CodecKind::Deflate.codec().decode(&joined).unwrap(), agg);

        values.remove(&layout.chunk_key(0, 1));
        assert_eq!(assemble(&layout, &set.meta, &values), None);
    }
}
