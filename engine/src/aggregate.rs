//! The per-user progress document.
//!
//! There is exactly one [`Aggregate`] per installation. It is always saved
//! and loaded as a whole; field names serialize in camelCase so documents
//! written by earlier releases load unchanged, and any field missing from an
//! older document takes its default.

use crate::clock::calendar_day;
use crate::{ItemId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Milliseconds in one day.
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Coins granted to a brand-new profile.
pub const STARTING_COINS: u64 = 100;

/// Daily AI explanation quota for free profiles.
pub const FREE_AI_LIMIT: u32 = 5;

/// Daily AI explanation quota for premium profiles.
pub const PREMIUM_AI_LIMIT: u32 = 50;

/// Inventory key of the power-up that protects a streak across a missed day.
pub const STREAK_FREEZE: &str = "streakFreeze";

/// Interval given to a word the user marks as already known.
pub const KNOWN_INTERVAL_DAYS: u32 = 30;

/// How long a finished daily session stays locked.
pub const SESSION_LOCK_MS: u64 = DAY_MS;

/// Learning status of a single vocabulary item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    #[default]
    New,
    Learning,
    Review,
    Mastered,
}

/// Spaced-repetition state of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    /// Current interval in days (meaningless while `status` is `New`)
    #[serde(default)]
    pub interval: u32,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    #[serde(default)]
    pub status: WordStatus,
    /// When the item is next due (milliseconds since epoch)
    #[serde(default)]
    pub next_review_date: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,
}

fn default_ease_factor() -> f64 {
    2.5
}

impl Default for WordProgress {
    fn default() -> Self {
        Self {
            interval: 0,
            ease_factor: default_ease_factor(),
            status: WordStatus::New,
            next_review_date: 0,
            difficulty: None,
            stability: None,
        }
    }
}

impl WordProgress {
    /// Whether the item is scheduled and due at `now`.
    pub fn is_due_at(&self, now: Timestamp) -> bool {
        self.status != WordStatus::New && self.next_review_date <= now
    }
}

/// A vocabulary item authored by the user.
///
/// Fields this release does not know about are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomWord {
    pub id: ItemId,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub level: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Integer currency balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(default)]
    pub coins: u64,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            coins: STARTING_COINS,
        }
    }
}

fn default_inventory() -> BTreeMap<String, u32> {
    BTreeMap::from([
        (STREAK_FREEZE.to_string(), 0),
        ("timeFreeze".to_string(), 1),
        ("bomb".to_string(), 1),
    ])
}

/// The whole user document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Aggregate {
    // Counters
    pub xp: u64,
    pub streak: u32,
    /// UTC day (YYYY-MM-DD) of the last daily rollover, empty before the first one
    pub last_login_date: String,
    pub words_learned_today: u32,
    pub ai_generations_today: u32,
    pub daily_progress_by_level: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_session_unlock_time: Option<Timestamp>,

    // Learning state
    pub word_progress: BTreeMap<ItemId, WordProgress>,
    pub word_comments: BTreeMap<ItemId, String>,
    pub custom_words: Vec<CustomWord>,

    // Economy and entitlement
    pub used_promo_codes: BTreeSet<String>,
    /// Lifetime entitlement
    pub premium_status: bool,
    pub premium_expiration: Option<Timestamp>,
    pub wallet: Wallet,
    pub inventory: BTreeMap<String, u32>,
    pub blitz_high_scores: BTreeMap<String, u32>,

    // Profile
    pub user_name: String,
    pub photo_url: String,
    pub has_seen_onboarding: bool,
    pub dark_mode: bool,

    // Sync bookkeeping
    /// Stamped on every mutation, before any IO starts
    pub last_local_update: Timestamp,
    /// Stamped only after the remote tier confirmed a write
    pub last_cloud_sync: Option<Timestamp>,
    pub last_auto_backup: Option<Timestamp>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            xp: 0,
            streak: 0,
            last_login_date: String::new(),
            words_learned_today: 0,
            ai_generations_today: 0,
            daily_progress_by_level: BTreeMap::new(),
            next_session_unlock_time: None,
            word_progress: BTreeMap::new(),
            word_comments: BTreeMap::new(),
            custom_words: Vec::new(),
            used_promo_codes: BTreeSet::new(),
            premium_status: false,
            premium_expiration: None,
            wallet: Wallet::default(),
            inventory: default_inventory(),
            blitz_high_scores: BTreeMap::new(),
            user_name: String::new(),
            photo_url: String::new(),
            has_seen_onboarding: false,
            dark_mode: false,
            last_local_update: 0,
            last_cloud_sync: None,
            last_auto_backup: None,
        }
    }
}

impl Aggregate {
    /// Lifetime entitlement, or a subscription that has not yet expired.
    pub fn is_premium_at(&self, now: Timestamp) -> bool {
        self.premium_status || self.premium_expiration.is_some_and(|exp| exp > now)
    }

    /// Daily AI explanation quota.
    pub fn ai_generation_limit(&self, now: Timestamp) -> u32 {
        if self.is_premium_at(now) {
            PREMIUM_AI_LIMIT
        } else {
            FREE_AI_LIMIT
        }
    }

    pub fn can_generate_ai(&self, now: Timestamp) -> bool {
        self.ai_generations_today < self.ai_generation_limit(now)
    }

    /// The subset of `ids` that is tracked and due for review at `now`.
    pub fn words_due_at<'a, I>(&self, ids: I, now: Timestamp) -> Vec<ItemId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter(|id| {
                self.word_progress
                    .get(*id)
                    .is_some_and(|wp| wp.is_due_at(now))
            })
            .map(str::to_string)
            .collect()
    }

    pub fn is_session_locked(&self, now: Timestamp) -> bool {
        self.next_session_unlock_time.is_some_and(|t| now < t)
    }

    /// Whether the remote tier holds everything this document contains.
    pub fn is_synced(&self) -> bool {
        self.last_cloud_sync
            .is_some_and(|synced| synced >= self.last_local_update)
    }

    /// Reset daily counters when a new calendar day starts and lift an
    /// expired session lock.
    ///
    /// A gap of more than one day consumes a streak freeze if one is
    /// available, otherwise the streak is lost. Returns `true` if anything
    /// changed. Does not touch the modification stamp; the caller saves.
    pub fn apply_daily_rollover(&mut self, today: NaiveDate, now: Timestamp) -> bool {
        let mut changed = false;
        let today_str = today.format("%Y-%m-%d").to_string();

        if self.last_login_date != today_str {
            let last = NaiveDate::parse_from_str(&self.last_login_date, "%Y-%m-%d").ok();
            match last {
                Some(last) if (today - last).num_days().abs() <= 1 => {}
                Some(_) => {
                    match self.inventory.get_mut(STREAK_FREEZE) {
                        Some(freezes) if *freezes > 0 => *freezes -= 1,
                        _ => self.streak = 0,
                    }
                }
                None => self.streak = 0,
            }

            self.words_learned_today = 0;
            self.ai_generations_today = 0;
            self.daily_progress_by_level.clear();
            self.next_session_unlock_time = None;
            self.last_login_date = today_str;
            changed = true;
        }

        if self.next_session_unlock_time.is_some_and(|t| now >= t) {
            self.words_learned_today = 0;
            self.daily_progress_by_level.clear();
            self.next_session_unlock_time = None;
            changed = true;
        }

        changed
    }

    /// [`apply_daily_rollover`](Self::apply_daily_rollover) using the UTC day of `now`.
    pub fn roll_over_at(&mut self, now: Timestamp) -> bool {
        self.apply_daily_rollover(calendar_day(now), now)
    }

    // ------------------------------------------------------------------------
    // Mutations
    //
    // Each returns whether it changed the document; a `false` leaves it
    // untouched. None of them stamps the document, the engine does on save.
    // ------------------------------------------------------------------------

    pub fn add_coins(&mut self, amount: u64) {
        self.wallet.coins = self.wallet.coins.saturating_add(amount);
    }

    /// Debit `amount`; fails on an insufficient balance.
    pub fn spend_coins(&mut self, amount: u64) -> bool {
        match self.wallet.coins.checked_sub(amount) {
            Some(left) => {
                self.wallet.coins = left;
                true
            }
            None => false,
        }
    }

    /// Pay `price` and add one `item` to the inventory.
    pub fn buy_item(&mut self, item: &str, price: u64) -> bool {
        if !self.spend_coins(price) {
            return false;
        }
        let count = self.inventory.entry(item.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        true
    }

    /// Use up one `item`; fails when none is left.
    pub fn consume_item(&mut self, item: &str) -> bool {
        match self.inventory.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Count one AI explanation against today's quota.
    pub fn increment_ai_usage(&mut self, now: Timestamp) -> bool {
        if !self.can_generate_ai(now) {
            return false;
        }
        self.ai_generations_today += 1;
        true
    }

    /// Add `word` unless a custom word with the same id exists.
    pub fn add_custom_word(&mut self, word: CustomWord) -> bool {
        if self.custom_words.iter().any(|w| w.id == word.id) {
            return false;
        }
        self.custom_words.push(word);
        true
    }

    /// Set the note on `id`; blank text removes it.
    pub fn save_word_comment(&mut self, id: &str, comment: &str) {
        if comment.trim().is_empty() {
            self.word_comments.remove(id);
        } else {
            self.word_comments.insert(id.to_string(), comment.to_string());
        }
    }

    /// Forget a tracked word together with its note.
    pub fn delete_word(&mut self, id: &str) -> bool {
        if self.word_progress.remove(id).is_none() {
            return false;
        }
        self.word_comments.remove(id);
        true
    }

    /// Forget a tracked word, or mark an untracked one as mastered.
    ///
    /// Returns `true` if the word is tracked afterwards.
    pub fn toggle_known_status(&mut self, id: &str, now: Timestamp) -> bool {
        if self.delete_word(id) {
            return false;
        }
        self.word_progress.insert(
            id.to_string(),
            WordProgress {
                interval: KNOWN_INTERVAL_DAYS,
                ease_factor: default_ease_factor(),
                status: WordStatus::Mastered,
                next_review_date: now + u64::from(KNOWN_INTERVAL_DAYS) * DAY_MS,
                difficulty: None,
                stability: None,
            },
        );
        true
    }

    /// Lock new sessions until a day after `now`.
    pub fn lock_daily_session(&mut self, now: Timestamp) {
        self.next_session_unlock_time = Some(now + SESSION_LOCK_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: Timestamp = 1_706_745_600_000; // 2024-02-01T00:00:00Z

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn defaults() {
        let agg = Aggregate::default();
        assert_eq!(agg.xp, 0);
        assert_eq!(agg.wallet.coins, STARTING_COINS);
        assert_eq!(agg.inventory.get("timeFreeze"), Some(&1));
        assert_eq!(agg.inventory.get("bomb"), Some(&1));
        assert_eq!(agg.inventory.get(STREAK_FREEZE), Some(&0));
        assert!(agg.word_progress.is_empty());
        assert_eq!(agg.last_cloud_sync, None);
    }

    #[test]
    fn legacy_document_fills_missing_fields() {
        let legacy = json!({
            "xp": 40,
            "streak": 2,
            "wordProgress": {
                "a1_cat": {"easeFactor": 2.5, "interval": 3, "nextReviewDate": 0, "status": "learning"}
            }
        });
        let agg: Aggregate = serde_json::from_value(legacy).unwrap();
        assert_eq!(agg.xp, 40);
        assert_eq!(agg.wallet.coins, STARTING_COINS);
        assert_eq!(agg.word_progress["a1_cat"].status, WordStatus::Learning);
        assert!(agg.custom_words.is_empty());
        assert_eq!(agg.last_local_update, 0);
    }

    #[test]
    fn serialization_format() {
        let agg = Aggregate::default();
        let json = serde_json::to_string(&agg).unwrap();
        assert!(json.contains("wordProgress"));
        assert!(json.contains("lastLocalUpdate"));
        assert!(json.contains("usedPromoCodes"));
        assert!(!json.contains("nextSessionUnlockTime"));
    }

    #[test]
    fn custom_word_keeps_unknown_fields() {
        let raw = json!({
            "id": "custom_1",
            "term": "serendipity",
            "translation": "счастливая случайность",
            "level": "C1",
            "examples": [{"en": "Pure serendipity.", "ru": "Чистая случайность."}],
            "isCustom": true
        });
        let word: CustomWord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(word.term, "serendipity");
        assert_eq!(word.extra["isCustom"], json!(true));
        assert_eq!(serde_json::to_value(&word).unwrap(), raw);
    }

    #[test]
    fn premium_lifetime_and_subscription() {
        let mut agg = Aggregate::default();
        assert!(!agg.is_premium_at(NOW));

        agg.premium_expiration = Some(NOW + 1);
        assert!(agg.is_premium_at(NOW));
        assert!(!agg.is_premium_at(NOW + 1));

        agg.premium_expiration = None;
        agg.premium_status = true;
        assert!(agg.is_premium_at(NOW));
    }

    #[test]
    fn ai_limit_follows_entitlement() {
        let mut agg = Aggregate::default();
        agg.ai_generations_today = FREE_AI_LIMIT;
        assert!(!agg.can_generate_ai(NOW));

        agg.premium_expiration = Some(NOW + DAY_MS);
        assert_eq!(agg.ai_generation_limit(NOW), PREMIUM_AI_LIMIT);
        assert!(agg.can_generate_ai(NOW));
    }

    #[test]
    fn due_words_skip_new_and_future() {
        let mut agg = Aggregate::default();
        agg.word_progress.insert(
            "due".into(),
            WordProgress {
                status: WordStatus::Review,
                next_review_date: NOW - 1,
                ..Default::default()
            },
        );
        agg.word_progress.insert(
            "later".into(),
            WordProgress {
                status: WordStatus::Review,
                next_review_date: NOW + DAY_MS,
                ..Default::default()
            },
        );
        agg.word_progress.insert("fresh".into(), WordProgress::default());

        let due = agg.words_due_at(["due", "later", "fresh", "unknown"], NOW);
        assert_eq!(due, vec!["due".to_string()]);
    }

    #[test]
    fn rollover_same_day_is_noop() {
        let mut agg = Aggregate {
            last_login_date: "2024-02-01".into(),
            words_learned_today: 7,
            ..Default::default()
        };
        assert!(!agg.apply_daily_rollover(day("2024-02-01"), NOW));
        assert_eq!(agg.words_learned_today, 7);
    }

    #[test]
    fn rollover_next_day_keeps_streak() {
        let mut agg = Aggregate {
            last_login_date: "2024-01-31".into(),
            streak: 4,
            words_learned_today: 7,
            ai_generations_today: 3,
            ..Default::default()
        };
        agg.daily_progress_by_level.insert("A1".into(), 7);

        assert!(agg.apply_daily_rollover(day("2024-02-01"), NOW));
        assert_eq!(agg.streak, 4);
        assert_eq!(agg.words_learned_today, 0);
        assert_eq!(agg.ai_generations_today, 0);
        assert!(agg.daily_progress_by_level.is_empty());
        assert_eq!(agg.last_login_date, "2024-02-01");
    }

    #[test]
    fn rollover_after_gap_uses_freeze() {
        let mut agg = Aggregate {
            last_login_date: "2024-01-28".into(),
            streak: 10,
            ..Default::default()
        };
        agg.inventory.insert(STREAK_FREEZE.into(), 1);

        assert!(agg.apply_daily_rollover(day("2024-02-01"), NOW));
        assert_eq!(agg.streak, 10);
        assert_eq!(agg.inventory[STREAK_FREEZE], 0);

        agg.last_login_date = "2024-01-20".into();
        assert!(agg.apply_daily_rollover(day("2024-02-01"), NOW));
        assert_eq!(agg.streak, 0);
    }

    #[test]
    fn rollover_lifts_expired_lock() {
        let mut agg = Aggregate {
            last_login_date: "2024-02-01".into(),
            words_learned_today: 20,
            next_session_unlock_time: Some(NOW - 1),
            ..Default::default()
        };
        assert!(agg.is_session_locked(NOW - 2));
        assert!(agg.apply_daily_rollover(day("2024-02-01"), NOW));
        assert_eq!(agg.words_learned_today, 0);
        assert_eq!(agg.next_session_unlock_time, None);
    }

    #[test]
    fn spending_needs_balance() {
        let mut agg = Aggregate::default();
        assert!(!agg.spend_coins(STARTING_COINS + 1));
        assert_eq!(agg.wallet.coins, STARTING_COINS);
        assert!(agg.spend_coins(STARTING_COINS));
        assert_eq!(agg.wallet.coins, 0);

        agg.add_coins(5);
        assert_eq!(agg.wallet.coins, 5);
    }

    #[test]
    fn buying_and_consuming_items() {
        let mut agg = Aggregate::default();
        assert!(agg.buy_item(STREAK_FREEZE, 60));
        assert_eq!(agg.wallet.coins, STARTING_COINS - 60);
        assert_eq!(agg.inventory[STREAK_FREEZE], 1);

        // Too expensive now: nothing is debited or added.
        assert!(!agg.buy_item(STREAK_FREEZE, 60));
        assert_eq!(agg.wallet.coins, STARTING_COINS - 60);
        assert_eq!(agg.inventory[STREAK_FREEZE], 1);

        assert!(agg.consume_item(STREAK_FREEZE));
        assert!(!agg.consume_item(STREAK_FREEZE));
        assert!(!agg.consume_item("unknown"));
        assert_eq!(agg.inventory[STREAK_FREEZE], 0);
    }

    #[test]
    fn ai_usage_stops_at_quota() {
        let mut agg = Aggregate::default();
        for _ in 0..FREE_AI_LIMIT {
            assert!(agg.increment_ai_usage(NOW));
        }
        assert!(!agg.increment_ai_usage(NOW));
        assert_eq!(agg.ai_generations_today, FREE_AI_LIMIT);

        agg.premium_status = true;
        assert!(agg.increment_ai_usage(NOW));
    }

    #[test]
    fn custom_words_are_unique_by_id() {
        let mut agg = Aggregate::default();
        let word = CustomWord {
            id: "custom_1".into(),
            term: "serendipity".into(),
            ..Default::default()
        };
        assert!(agg.add_custom_word(word.clone()));
        assert!(!agg.add_custom_word(CustomWord {
            term: "other".into(),
            ..word
        }));
        assert_eq!(agg.custom_words.len(), 1);
        assert_eq!(agg.custom_words[0].term, "serendipity");
    }

    #[test]
    fn blank_comment_removes_note() {
        let mut agg = Aggregate::default();
        agg.save_word_comment("a1_cat", "кошка");
        assert_eq!(agg.word_comments["a1_cat"], "кошка");
        agg.save_word_comment("a1_cat", "  \n");
        assert!(!agg.word_comments.contains_key("a1_cat"));
    }

    #[test]
    fn toggling_known_status() {
        let mut agg = Aggregate::default();
        assert!(agg.toggle_known_status("a1_cat", NOW));
        let wp = &agg.word_progress["a1_cat"];
        assert_eq!(wp.status, WordStatus::Mastered);
        assert_eq!(wp.interval, KNOWN_INTERVAL_DAYS);
        assert_eq!(wp.next_review_date, NOW + 30 * DAY_MS);

        agg.save_word_comment("a1_cat", "note");
        assert!(!agg.toggle_known_status("a1_cat", NOW));
        assert!(agg.word_progress.is_empty());
        assert!(agg.word_comments.is_empty());
    }

    #[test]
    fn deleting_untracked_word_keeps_note() {
        let mut agg = Aggregate::default();
        agg.save_word_comment("a1_dog", "собака");
        assert!(!agg.delete_word("a1_dog"));
        assert_eq!(agg.word_comments.len(), 1);
    }

    #[test]
    fn session_lock_lasts_a_day() {
        let mut agg = Aggregate::default();
        agg.lock_daily_session(NOW);
        assert!(agg.is_session_locked(NOW + DAY_MS - 1));
        assert!(!agg.is_session_locked(NOW + DAY_MS));
    }

    #[test]
    fn synced_flag() {
        let mut agg = Aggregate {
            last_local_update: 500,
            ..Default::default()
        };
        assert!(!agg.is_synced());
        agg.last_cloud_sync = Some(400);
        assert!(!agg.is_synced());
        agg.last_cloud_sync = Some(500);
        assert!(agg.is_synced());
    }
}
