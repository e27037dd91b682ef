//! Per-user key-value storage.
//!
//! Each user owns an ordered map of keys to string values. Limits mirror the
//! hosted cloud store the client is built against: short alphanumeric keys,
//! a per-value byte limit and a per-user key quota.

use crate::config::Config;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

/// Longest accepted key.
pub const MAX_KEY_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid key {0:?}: use 1-128 characters from A-Z, a-z, 0-9, _ and -")]
    InvalidKey(String),

    #[error("value is {len} bytes, limit is {max}")]
    ValueTooLarge { len: usize, max: usize },

    #[error("key quota of {max} exceeded")]
    QuotaExceeded { max: usize },

    #[error("batch of {len} keys exceeds limit of {max}")]
    BatchTooLarge { len: usize, max: usize },
}

#[derive(Debug)]
pub struct KvStore {
    users: DashMap<String, BTreeMap<String, Item>>,
    max_value_len: usize,
    max_keys_per_user: usize,
    max_batch_keys: usize,
}

impl KvStore {
    pub fn new(config: &Config) -> Self {
        Self {
            users: DashMap::new(),
            max_value_len: config.max_value_len,
            max_keys_per_user: config.max_keys_per_user,
            max_batch_keys: config.max_batch_keys,
        }
    }

    pub fn get(&self, user: &str, key: &str) -> Result<Option<Item>, StoreError> {
        validate_key(key)?;
        Ok(self
            .users
            .get(user)
            .and_then(|items| items.get(key).cloned()))
    }

    pub fn put(&self, user: &str, key: &str, value: String) -> Result<Item, StoreError> {
        validate_key(key)?;
        if value.len() > self.max_value_len {
            return Err(StoreError::ValueTooLarge {
                len: value.len(),
                max: self.max_value_len,
            });
        }

        let mut items = self.users.entry(user.to_string()).or_default();
        if !items.contains_key(key) && items.len() >= self.max_keys_per_user {
            return Err(StoreError::QuotaExceeded {
                max: self.max_keys_per_user,
            });
        }

        let item = Item {
            value,
            updated_at: Utc::now(),
        };
        items.insert(key.to_string(), item.clone());
        Ok(item)
    }

    /// Values for the keys that exist.
    pub fn get_many(&self, user: &str, keys: &[String]) -> Result<HashMap<String, String>, StoreError> {
        self.check_batch(keys)?;
        let Some(items) = self.users.get(user) else {
            return Ok(HashMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|k| items.get(k).map(|item| (k.clone(), item.value.clone())))
            .collect())
    }

    /// Remove `keys`, returning how many existed.
    pub fn remove_many(&self, user: &str, keys: &[String]) -> Result<usize, StoreError> {
        self.check_batch(keys)?;
        let Some(mut items) = self.users.get_mut(user) else {
            return Ok(0);
        };
        Ok(keys.iter().filter(|k| items.remove(*k).is_some()).count())
    }

    pub fn remove(&self, user: &str, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self
            .users
            .get_mut(user)
            .is_some_and(|mut items| items.remove(key).is_some()))
    }

    pub fn key_count(&self, user: &str) -> usize {
        self.users.get(user).map_or(0, |items| items.len())
    }

    fn check_batch(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.len() > self.max_batch_keys {
            return Err(StoreError::BatchTooLarge {
                len: keys.len(),
                max: self.max_batch_keys,
            });
        }
        keys.iter().try_for_each(|k| validate_key(k))
    }
}

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
