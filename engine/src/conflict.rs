//! Divergence between the local document and the remote copy.
//!
//! Divergence is judged on timestamps alone: the local document's
//! `last_local_update` against the `timestamp` in the remote metadata. A
//! remote copy that is newer by more than a grace skew is a [`Conflict`],
//! which is handed to the caller to resolve rather than settled silently.

use crate::{Aggregate, Timestamp};
use serde::{Deserialize, Serialize};

/// Default grace skew absorbing clock jitter between devices.
pub const DEFAULT_CONFLICT_GRACE_MS: u64 = 60_000;

/// Remote data materially newer than local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub local_timestamp: Timestamp,
    pub remote_timestamp: Timestamp,
}

impl Conflict {
    /// How far ahead the remote copy is.
    pub fn lead(&self) -> u64 {
        self.remote_timestamp.saturating_sub(self.local_timestamp)
    }
}

/// How the caller settles a [`Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Keep this device's document and make it the committed remote copy.
    KeepLocal,
    /// Replace this device's document with the remote copy.
    AdoptRemote,
}

/// `Some` when the remote copy leads the local one by more than `grace_ms`.
pub fn detect_conflict(
    local_timestamp: Timestamp,
    remote_timestamp: Timestamp,
    grace_ms: u64,
) -> Option<Conflict> {
    (remote_timestamp > local_timestamp.saturating_add(grace_ms)).then_some(Conflict {
        local_timestamp,
        remote_timestamp,
    })
}

/// Combine an imported document with the one currently on this device.
///
/// The imported document wins, except for fields that describe this device
/// rather than the learner's progress: display name and avatar (when set
/// here), the last auto-backup stamp and the remote sync stamp.
pub fn merge_import(imported: Aggregate, current: &Aggregate) -> Aggregate {
    let mut merged = imported;

    if !current.user_name.is_empty() {
        merged.user_name = current.user_name.clone();
    }
    if !current.photo_url.is_empty() {
        merged.photo_url = current.photo_url.clone();
    }
    if current.last_auto_backup.is_some() {
        merged.last_auto_backup = current.last_auto_backup;
    }
    merged.last_cloud_sync = current.last_cloud_sync;

    merged
}
