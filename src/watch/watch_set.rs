// src/watch/watch_set.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::ConfigKey;
use crate::watch::fingerprint::Fingerprint;

/// The entries a watch session observes, with their last-known fingerprint.
///
/// `None` means "known not to exist / never fetched". Entries are never
/// removed while a session runs: a deleted entry stays tracked with `None` so
/// that recreating it is detected on a later long-poll.
///
/// A `WatchSet` is owned by exactly one `WatchLoop`; nothing else mutates it
/// while the loop runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    entries: BTreeMap<ConfigKey, Option<Fingerprint>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `key`. Re-inserting an existing key overwrites its
    /// fingerprint.
    pub fn insert(&mut self, key: ConfigKey, fingerprint: Option<Fingerprint>) {
        self.entries.insert(key, fingerprint);
    }

    /// `None` when the key is untracked; `Some(None)` when tracked but absent.
    pub fn get(&self, key: &ConfigKey) -> Option<&Option<Fingerprint>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConfigKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a new fingerprint for a tracked key.
    ///
    /// Returns `false` (and changes nothing) when the key is not tracked.
    pub fn set_fingerprint(&mut self, key: &ConfigKey, fingerprint: Fingerprint) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                debug!(key = %key, fingerprint = %fingerprint.short(), "advancing fingerprint");
                *slot = Some(fingerprint);
                true
            }
            None => false,
        }
    }

    /// Reset a tracked key to "absent" so recreation can be detected.
    pub fn mark_absent(&mut self, key: &ConfigKey) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                debug!(key = %key, "marking entry absent");
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Find the tenant of a tracked entry with this data-id and group.
    ///
    /// Servers may omit the tenant for the default scope in change
    /// notifications; the first matching entry wins.
    pub fn backfill_tenant(&self, data_id: &str, group: &str) -> Option<&str> {
        self.entries
            .keys()
            .find(|k| k.data_id == data_id && k.group == group)
            .map(|k| k.tenant.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigKey, Option<&Fingerprint>)> {
        self.entries.iter().map(|(k, fp)| (k, fp.as_ref()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ConfigKey, Option<Fingerprint>)> for WatchSet {
    fn from_iter<I: IntoIterator<Item = (ConfigKey, Option<Fingerprint>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
