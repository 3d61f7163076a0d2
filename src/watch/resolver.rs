// src/watch/resolver.rs

//! Turns "this entry may have changed" notifications into verdicts.
//!
//! The decision itself ([`classify`]) is a pure function over the watch set
//! and the outcome of a fetch, so it can be tested without any store. The
//! [`ChangeResolver`] wraps it with the actual fetch.

use tracing::{debug, warn};

use crate::errors::{Result, SkillwatchError};
use crate::store::ConfigStore;
use crate::types::ConfigKey;
use crate::watch::fingerprint::{fingerprint, Fingerprint};
use crate::watch::watch_set::WatchSet;

/// One entry the server reported as possibly changed.
///
/// `tenant` may be empty when the server omits it for the default scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
}

impl ChangeNotification {
    pub fn new(
        data_id: impl Into<String>,
        group: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
            tenant: tenant.into(),
        }
    }
}

/// Verdict for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedChange {
    /// Stale or duplicate notification; nothing to do.
    Unchanged,
    /// The entry disappeared (first observation of the absence).
    Deleted,
    /// The entry has content we have not seen yet.
    Updated {
        content: String,
        fingerprint: Fingerprint,
    },
}

/// A verdict together with the (tenant-backfilled) key it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub key: ConfigKey,
    pub change: ResolvedChange,
}

/// Result of fetching the current content of an entry.
#[derive(Debug)]
pub enum FetchOutcome {
    Found(String),
    NotFound,
    Failed(SkillwatchError),
}

impl From<Result<String>> for FetchOutcome {
    fn from(res: Result<String>) -> Self {
        match res {
            Ok(content) => FetchOutcome::Found(content),
            Err(e) if e.is_not_found() => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

/// Map a notification onto the key we track, filling in a missing tenant
/// from the watch set.
pub fn resolve_key(watch_set: &WatchSet, notification: &ChangeNotification) -> ConfigKey {
    let tenant = if notification.tenant.is_empty() {
        watch_set
            .backfill_tenant(&notification.data_id, &notification.group)
            .unwrap_or_default()
            .to_string()
    } else {
        notification.tenant.clone()
    };
    ConfigKey::new(&notification.data_id, &notification.group, tenant)
}

/// Decide what a fetch outcome means for a key.
///
/// `current` is the watch-set slot for the key: `None` when untracked,
/// `Some(None)` when tracked but known absent.
///
/// Errors are fetch failures other than "not found"; the caller drops the
/// notification and leaves the watch set untouched.
pub fn classify(
    current: Option<&Option<Fingerprint>>,
    outcome: FetchOutcome,
) -> Result<ResolvedChange> {
    let Some(current) = current else {
        return match outcome {
            FetchOutcome::Failed(e) => Err(e),
            _ => Ok(ResolvedChange::Unchanged),
        };
    };

    match outcome {
        FetchOutcome::NotFound => match current {
            None => Ok(ResolvedChange::Unchanged),
            Some(_) => Ok(ResolvedChange::Deleted),
        },
        FetchOutcome::Failed(e) => Err(e),
        FetchOutcome::Found(content) => {
            let fp = fingerprint(content.as_bytes());
            if current.as_ref() == Some(&fp) {
                Ok(ResolvedChange::Unchanged)
            } else {
                Ok(ResolvedChange::Updated {
                    content,
                    fingerprint: fp,
                })
            }
        }
    }
}

/// Fetches and classifies notifications against a watch set.
#[derive(Debug)]
pub struct ChangeResolver<S> {
    store: S,
}

impl<S: ConfigStore> ChangeResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn resolve(
        &self,
        watch_set: &WatchSet,
        notification: &ChangeNotification,
    ) -> Result<Resolution> {
        let key = resolve_key(watch_set, notification);
        let current = watch_set.get(&key);

        if current.is_none() {
            warn!(key = %key, "notification for an untracked entry; ignoring");
            return Ok(Resolution {
                key,
                change: ResolvedChange::Unchanged,
            });
        }

        let outcome = FetchOutcome::from(self.store.fetch(&key).await);
        let change = classify(current, outcome)?;

        match &change {
            ResolvedChange::Unchanged => debug!(key = %key, "fingerprint unchanged; suppressing"),
            ResolvedChange::Deleted => debug!(key = %key, "entry deleted"),
            ResolvedChange::Updated { fingerprint, .. } => {
                debug!(key = %key, fingerprint = %fingerprint.short(), "entry updated")
            }
        }

        Ok(Resolution { key, change })
    }
}
