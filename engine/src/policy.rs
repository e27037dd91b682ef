//! Write scheduling decisions.
//!
//! One policy object with two tunables: the debounce window that collapses
//! bursts of saves into one write, and the minimum interval between remote
//! pushes that are not explicitly requested. The policy only decides; the
//! host owns the timers.

use crate::Timestamp;
use std::time::Duration;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2_000);

/// Default minimum interval between unrequested remote pushes.
pub const DEFAULT_MIN_REMOTE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Quiet period after the last save before writes start
    pub debounce: Duration,
    /// Minimum time since the last confirmed remote sync before an
    /// unrequested push is due
    pub min_remote_interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            min_remote_interval: DEFAULT_MIN_REMOTE_INTERVAL,
        }
    }
}

impl SyncPolicy {
    pub fn new(debounce: Duration, min_remote_interval: Duration) -> Self {
        Self {
            debounce,
            min_remote_interval,
        }
    }

    /// Whether a save at `now` should also push to the remote tier.
    ///
    /// An explicit request always pushes. Otherwise a push is due once the
    /// minimum interval has passed since the last confirmed sync, or if the
    /// document was never synced at all.
    pub fn remote_push_due(
        &self,
        requested: bool,
        now: Timestamp,
        last_remote_sync: Option<Timestamp>,
    ) -> bool {
        if requested {
            return true;
        }
        match last_remote_sync {
            None => true,
            Some(last) => now.saturating_sub(last) >= duration_ms(self.min_remote_interval),
        }
    }

    /// Whether an automatic backup is due at `now`.
    pub fn auto_backup_due(
        interval: Duration,
        now: Timestamp,
        last_backup: Option<Timestamp>,
    ) -> bool {
        match last_backup {
            None => true,
            Some(last) => now.saturating_sub(last) >= duration_ms(interval),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = 1_706_745_600_000;

    #[test]
    fn defaults() {
        let policy = SyncPolicy::default();
        assert_eq!(policy.debounce, Duration::from_secs(2));
        assert_eq!(policy.min_remote_interval, Duration::from_secs(300));
    }

    #[test]
    fn requested_push_is_always_due() {
        let policy = SyncPolicy::default();
        assert!(policy.remote_push_due(true, NOW, Some(NOW)));
    }

    #[test]
    fn never_synced_is_due() {
        let policy = SyncPolicy::default();
        assert!(policy.remote_push_due(false, NOW, None));
    }

    #[test]
    fn throttled_until_interval_passes() {
        let policy = SyncPolicy::default();
        let last = NOW - 299_999;
        assert!(!policy.remote_push_due(false, NOW, Some(last)));
        assert!(policy.remote_push_due(false, NOW + 1, Some(last)));
    }

    #[test]
    fn clock_behind_last_sync_is_not_due() {
        let policy = SyncPolicy::new(Duration::ZERO, Duration::from_secs(1));
        assert!(!policy.remote_push_due(false, NOW, Some(NOW + 10_000)));
    }

    #[test]
    fn auto_backup_interval() {
        let day = Duration::from_secs(86_400);
        assert!(SyncPolicy::auto_backup_due(day, NOW, None));
        assert!(!SyncPolicy::auto_backup_due(day, NOW, Some(NOW - 1_000)));
        assert!(SyncPolicy::auto_backup_due(day, NOW, Some(NOW - 86_400_000)));
    }
}
