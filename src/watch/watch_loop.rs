// src/watch/watch_loop.rs

//! The watch session: long-poll → resolve → dispatch, until cancelled.
//!
//! State machine:
//!
//! ```text
//! Polling ──changes──▶ Resolving ──▶ Dispatching ──▶ Polling
//!    │  └─no changes / malformed─▶ Polling
//!    └─transport error─▶ Backoff ──▶ Polling
//! any state ──cancelled──▶ Stopped
//! ```
//!
//! The loop owns its [`WatchSet`] exclusively. A fingerprint only advances
//! after the handler succeeded for that key, so the set passed into the next
//! long-poll always reflects the last successful resolution.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SkillwatchError};
use crate::store::ConfigStore;
use crate::watch::handler::{ChangeEvent, ChangeHandler, ChangeKind};
use crate::watch::resolver::{ChangeNotification, ChangeResolver, Resolution, ResolvedChange};
use crate::watch::transport::LongPollTransport;
use crate::watch::watch_set::WatchSet;

/// Default pause after a failed long-poll call.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Tunables for a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Pause after a transport error before polling again.
    pub retry_backoff: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Counters for one resolve/dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Fetch failures plus handler failures.
    pub failed: usize,
}

impl CycleReport {
    pub fn dispatched(&self) -> usize {
        self.updated + self.deleted
    }
}

#[derive(Debug)]
enum LoopState {
    Polling,
    Backoff,
    Resolving(Vec<ChangeNotification>),
    Dispatching(Vec<Resolution>),
    Stopped,
}

/// One watch session over a single watch set.
pub struct WatchLoop<T, S, H> {
    watch_set: WatchSet,
    transport: T,
    resolver: ChangeResolver<S>,
    handler: H,
    options: WatchOptions,
}

impl<T, S, H> fmt::Debug for WatchLoop<T, S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchLoop")
            .field("watch_set", &self.watch_set)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T, S, H> WatchLoop<T, S, H>
where
    T: LongPollTransport,
    S: ConfigStore,
    H: ChangeHandler,
{
    pub fn new(
        watch_set: WatchSet,
        transport: T,
        store: S,
        handler: H,
        options: WatchOptions,
    ) -> Self {
        Self {
            watch_set,
            transport,
            resolver: ChangeResolver::new(store),
            handler,
            options,
        }
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_watch_set(self) -> WatchSet {
        self.watch_set
    }

    /// Run until `cancel` fires.
    ///
    /// Errors never end the loop; they are logged and retried. The only way
    /// out is cancellation, after which this returns `Ok(())`.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(entries = self.watch_set.len(), "watch loop started");

        let mut state = LoopState::Polling;
        let mut report = CycleReport::default();

        loop {
            state = match state {
                LoopState::Polling => self.poll(&cancel).await,
                LoopState::Backoff => self.backoff(&cancel).await,
                LoopState::Resolving(batch) => {
                    match self.resolve_batch(batch, &cancel, &mut report).await {
                        Some(resolutions) => LoopState::Dispatching(resolutions),
                        None => LoopState::Stopped,
                    }
                }
                LoopState::Dispatching(resolutions) => {
                    let completed = self.dispatch(resolutions, &cancel, &mut report).await;
                    log_cycle(&report);
                    report = CycleReport::default();
                    if completed {
                        LoopState::Polling
                    } else {
                        LoopState::Stopped
                    }
                }
                LoopState::Stopped => break,
            };
        }

        info!("watch loop stopped");
        Ok(())
    }

    /// Resolve and dispatch one batch of notifications without polling.
    pub async fn process_batch(
        &mut self,
        batch: Vec<ChangeNotification>,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        if let Some(resolutions) = self.resolve_batch(batch, cancel, &mut report).await {
            self.dispatch(resolutions, cancel, &mut report).await;
        }
        report
    }

    async fn poll(&mut self, cancel: &CancellationToken) -> LoopState {
        if cancel.is_cancelled() {
            return LoopState::Stopped;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("cancelled during long-poll");
                return LoopState::Stopped;
            }
            res = self.transport.poll(&self.watch_set) => res,
        };

        match outcome {
            Ok(batch) if batch.is_empty() => LoopState::Polling,
            Ok(batch) => {
                debug!(count = batch.len(), "server reported changed entries");
                LoopState::Resolving(batch)
            }
            Err(SkillwatchError::MalformedResponse(msg)) => {
                warn!(error = %msg, "dropping undecodable long-poll response");
                LoopState::Polling
            }
            Err(err) => {
                warn!(
                    error = %err,
                    backoff = ?self.options.retry_backoff,
                    "long-poll failed; backing off"
                );
                LoopState::Backoff
            }
        }
    }

    async fn backoff(&mut self, cancel: &CancellationToken) -> LoopState {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => LoopState::Stopped,
            _ = tokio::time::sleep(self.options.retry_backoff) => LoopState::Polling,
        }
    }

    /// Returns `None` when cancellation was observed part-way through.
    async fn resolve_batch(
        &mut self,
        batch: Vec<ChangeNotification>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Option<Vec<Resolution>> {
        let mut resolutions: Vec<Resolution> = Vec::with_capacity(batch.len());

        for notification in &batch {
            if cancel.is_cancelled() {
                return None;
            }

            match self.resolver.resolve(&self.watch_set, notification).await {
                Ok(Resolution {
                    change: ResolvedChange::Unchanged,
                    ..
                }) => report.unchanged += 1,
                Ok(resolution) => {
                    // The same key reported twice in one batch is dispatched once.
                    if resolutions.iter().any(|r| r.key == resolution.key) {
                        report.unchanged += 1;
                    } else {
                        resolutions.push(resolution);
                    }
                }
                Err(err) => {
                    warn!(
                        data_id = %notification.data_id,
                        group = %notification.group,
                        error = %err,
                        "failed to fetch changed entry; will retry on next notification"
                    );
                    report.failed += 1;
                }
            }
        }

        Some(resolutions)
    }

    /// Returns `false` when cancellation stopped dispatching early.
    async fn dispatch(
        &mut self,
        resolutions: Vec<Resolution>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> bool {
        for Resolution { key, change } in resolutions {
            if cancel.is_cancelled() {
                info!("cancellation observed; remaining changes not dispatched");
                return false;
            }

            let (kind, new_fingerprint) = match change {
                ResolvedChange::Unchanged => continue,
                ResolvedChange::Deleted => (ChangeKind::Deleted, None),
                ResolvedChange::Updated { fingerprint, .. } => {
                    (ChangeKind::Updated, Some(fingerprint))
                }
            };

            let event = ChangeEvent {
                key: key.clone(),
                kind,
            };

            match self.handler.handle(&event).await {
                Ok(()) => match new_fingerprint {
                    Some(fp) => {
                        self.watch_set.set_fingerprint(&key, fp);
                        report.updated += 1;
                    }
                    None => {
                        self.watch_set.mark_absent(&key);
                        report.deleted += 1;
                    }
                },
                Err(err) => {
                    let err = SkillwatchError::Handler {
                        key: key.to_string(),
                        source: Box::new(err),
                    };
                    warn!(error = %err, "fingerprint not advanced");
                    report.failed += 1;
                }
            }
        }

        true
    }
}

fn log_cycle(report: &CycleReport) {
    if report.dispatched() > 0 || report.failed > 0 {
        info!(
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            "change cycle complete"
        );
    } else {
        debug!(unchanged = report.unchanged, "change cycle complete; nothing dispatched");
    }
}
