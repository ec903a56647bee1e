//! Dedupe cache of reminders already notified on this device.
//!
//! The cache is a local optimization: the authoritative sent-state lives on
//! the reminder row. It only stops the same device from showing the same
//! notification twice.

use crate::ReminderId;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Key identifying one notified reminder state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    /// The "due soon" / "due now" notification
    DueSoon(ReminderId),
    /// The overdue notification
    Overdue(ReminderId),
}

impl DedupeKey {
    /// Stored form of the key.
    pub fn to_cache_key(&self) -> String {
        match self {
            DedupeKey::DueSoon(id) => id.clone(),
            DedupeKey::Overdue(id) => format!("{}-overdue", id),
        }
    }
}

/// Size bounds applied by [`DedupeCache::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupePolicy {
    /// Compaction triggers once the cache holds more than this many keys
    pub max_entries: usize,
    /// Number of newest keys kept by a compaction
    pub retain_entries: usize,
}

impl Default for DedupePolicy {
    fn default() -> Self {
        Self {
            max_entries: 100,
            retain_entries: 50,
        }
    }
}

/// Insertion-ordered set of notified keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct DedupeCache {
    entries: VecDeque<String>,
    index: HashSet<String>,
}

impl DedupeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key was already notified.
    pub fn contains(&self, key: &DedupeKey) -> bool {
        self.index.contains(&key.to_cache_key())
    }

    /// Record a key. Returns false if it was already present.
    pub fn insert(&mut self, key: &DedupeKey) -> bool {
        self.insert_raw(key.to_cache_key())
    }

    fn insert_raw(&mut self, key: String) -> bool {
        if !self.index.insert(key.clone()) {
            return false;
        }
        self.entries.push_back(key);
        true
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Drop the oldest keys once the cache grew past the policy bound.
    ///
    /// Returns the number of keys dropped.
    pub fn compact(&mut self, policy: DedupePolicy) -> usize {
        if self.entries.len() <= policy.max_entries {
            return 0;
        }

        let keep = policy.retain_entries.min(self.entries.len());
        let dropped = self.entries.len() - keep;
        for key in self.entries.drain(..dropped) {
            self.index.remove(&key);
        }
        dropped
    }
}

impl From<Vec<String>> for DedupeCache {
    fn from(keys: Vec<String>) -> Self {
        let mut cache = DedupeCache::new();
        for key in keys {
            cache.insert_raw(key);
        }
        cache
    }
}

impl From<DedupeCache> for Vec<String> {
    fn from(cache: DedupeCache) -> Self {
        cache.entries.into()
    }
}
