use std::collections::{HashMap, VecDeque};
use std::future;
use std::sync::{Arc, Mutex};

use skillwatch::errors::{Result, SkillwatchError};
use skillwatch::store::ConfigStore;
use skillwatch::types::{BoxFuture, ConfigKey};
use skillwatch::watch::{ChangeEvent, ChangeHandler, ChangeNotification, LongPollTransport, WatchSet};
use tokio_util::sync::CancellationToken;

/// In-memory `ConfigStore`.
///
/// Clones share state, so a test can keep one handle to mutate the store
/// while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<ConfigKey, String>,
    failures: HashMap<ConfigKey, usize>,
    fetches: Vec<ConfigKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &ConfigKey, content: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .entries
            .insert(key.clone(), content.into());
    }

    pub fn remove(&self, key: &ConfigKey) {
        self.inner.lock().unwrap().entries.remove(key);
    }

    /// Make the next `times` fetches of `key` fail with a transport error.
    pub fn fail_next(&self, key: &ConfigKey, times: usize) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(key.clone(), times);
    }

    /// Total number of fetches so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches.len()
    }

    pub fn fetches_of(&self, key: &ConfigKey) -> usize {
        self.inner
            .lock()
            .unwrap()
            .fetches
            .iter()
            .filter(|k| *k == key)
            .count()
    }
}

impl ConfigStore for MemoryStore {
    fn fetch<'a>(&'a self, key: &'a ConfigKey) -> BoxFuture<'a, Result<String>> {
        let result = {
            let mut state = self.inner.lock().unwrap();
            state.fetches.push(key.clone());
            match state.failures.get_mut(key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(SkillwatchError::transport(Some(500), "injected failure"))
                }
                _ => state
                    .entries
                    .get(key)
                    .cloned()
                    .ok_or_else(|| SkillwatchError::NotFound(key.to_string())),
            }
        };
        Box::pin(future::ready(result))
    }
}

/// `ChangeHandler` that records every event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
    failures: Arc<Mutex<usize>>,
    cancel_after: Arc<Mutex<Option<(usize, CancellationToken)>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls (they are still recorded).
    pub fn fail_next(&self, times: usize) {
        *self.failures.lock().unwrap() = times;
    }

    /// Cancel `token` once `calls` events have been handled.
    pub fn cancel_after(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ChangeHandler for RecordingHandler {
    fn handle<'a>(&'a mut self, event: &'a ChangeEvent) -> BoxFuture<'a, Result<()>> {
        let calls = {
            let mut events = self.events.lock().unwrap();
            events.push(event.clone());
            events.len()
        };

        if let Some((limit, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if calls >= *limit {
                token.cancel();
            }
        }

        let result = {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                Err(SkillwatchError::Other(anyhow::anyhow!(
                    "handler failure for {}",
                    event.key
                )))
            } else {
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }
}

/// `LongPollTransport` that replays a fixed script of poll results.
///
/// Every poll records a snapshot of the watch set it was given. Once the
/// script runs out, `poll` cancels the `on_drained` token (if any) and then
/// never completes, like a long-poll with nothing to report.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<Vec<ChangeNotification>>>>>,
    polls: Arc<Mutex<Vec<WatchSet>>>,
    on_drained: Option<CancellationToken>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.on_drained = Some(token);
        self
    }

    pub fn push_changes(&self, changes: Vec<ChangeNotification>) -> &Self {
        self.script.lock().unwrap().push_back(Ok(changes));
        self
    }

    pub fn push_error(&self, err: SkillwatchError) -> &Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    /// Number of polls issued so far, including the one that found the
    /// script empty.
    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    /// Watch set as passed to each poll, in order.
    pub fn polled_sets(&self) -> Vec<WatchSet> {
        self.polls.lock().unwrap().clone()
    }
}

impl LongPollTransport for ScriptedTransport {
    fn poll<'a>(
        &'a mut self,
        watch_set: &'a WatchSet,
    ) -> BoxFuture<'a, Result<Vec<ChangeNotification>>> {
        self.polls.lock().unwrap().push(watch_set.clone());
        let next = self.script.lock().unwrap().pop_front();
        if let Some(result) = next {
            return Box::pin(future::ready(result));
        }
        if let Some(token) = &self.on_drained {
            token.cancel();
        }
        Box::pin(future::pending())
    }
}
