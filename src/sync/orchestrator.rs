// src/sync/orchestrator.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{Result, SkillwatchError};
use crate::mirror::{skill_key, skill_name_from_group, Mirror, SKILL_DATA_ID};
use crate::store::{ConfigStore, NacosClient};
use crate::sync::handler::MirrorHandler;
use crate::watch::{fingerprint, LongPollTransport, WatchLoop, WatchOptions, WatchSet};

/// Page size used when discovering every skill in the namespace.
const DISCOVERY_PAGE_SIZE: usize = 500;

/// What seeding found for each requested skill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub watch_set: WatchSet,
    /// Present remotely and written locally.
    pub materialized: Vec<String>,
    /// Absent remotely; watched for creation.
    pub absent: Vec<String>,
    /// Could not be fetched or materialized; not watched.
    pub skipped: Vec<String>,
}

/// Builds the watch set for a list of skills and keeps their local mirror in
/// sync with the store.
#[derive(Debug)]
pub struct SkillSyncer<S, M> {
    store: Arc<S>,
    mirror: Arc<M>,
    namespace: String,
}

impl<S: ConfigStore, M: Mirror> SkillSyncer<S, M> {
    pub fn new(store: Arc<S>, mirror: Arc<M>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            mirror,
            namespace: namespace.into(),
        }
    }

    /// The handler the watch loop dispatches changes to.
    pub fn handler(&self) -> MirrorHandler<Arc<M>> {
        MirrorHandler::new(Arc::clone(&self.mirror))
    }

    /// Fetch each skill once and build the initial watch set.
    ///
    /// - absent skill: watched with no fingerprint; a stale local copy is removed.
    /// - present skill: materialized, then watched with its fingerprint.
    /// - anything else: logged and skipped.
    ///
    /// Fails when `names` is empty or no skill could be watched at all.
    pub async fn seed(&self, names: &[String]) -> Result<SeedOutcome> {
        if names.is_empty() {
            return Err(SkillwatchError::Seed("no skills specified".to_string()));
        }

        info!(count = names.len(), "initializing synchronization");
        let mut outcome = SeedOutcome::default();

        for name in names {
            let key = skill_key(name, &self.namespace);
            if outcome.watch_set.contains(&key) {
                continue;
            }

            match self.store.fetch(&key).await {
                Err(err) if err.is_not_found() => {
                    info!(skill = %name, "skill not found remotely; will watch for creation");
                    if self.mirror.exists(name) {
                        match self.mirror.remove(name) {
                            Ok(_) => info!(skill = %name, "stale local copy removed"),
                            Err(e) => warn!(skill = %name, error = %e, "failed to remove stale local copy"),
                        }
                    }
                    outcome.watch_set.insert(key, None);
                    outcome.absent.push(name.clone());
                }
                Err(err) => {
                    warn!(skill = %name, error = %err, "failed to fetch skill; skipping");
                    outcome.skipped.push(name.clone());
                }
                Ok(content) => {
                    let fp = fingerprint(content.as_bytes());
                    info!(skill = %name, fingerprint = %fp.short(), "fetched skill");
                    match self.mirror.materialize(name).await {
                        Ok(path) => {
                            info!(skill = %name, path = ?path, "downloaded");
                            outcome.watch_set.insert(key, Some(fp));
                            outcome.materialized.push(name.clone());
                        }
                        Err(e) => {
                            warn!(skill = %name, error = %e, "failed to download skill; skipping");
                            outcome.skipped.push(name.clone());
                        }
                    }
                }
            }
        }

        if outcome.watch_set.is_empty() {
            return Err(SkillwatchError::Seed(format!(
                "none of {} skill(s) could be watched",
                names.len()
            )));
        }

        if outcome.materialized.is_empty() {
            info!("no existing skills found; monitoring for creation");
        } else {
            info!(count = outcome.materialized.len(), "initialized existing skills");
        }

        Ok(outcome)
    }

    /// Seed, then watch until `cancel` fires.
    pub async fn run<T: LongPollTransport>(
        &self,
        names: &[String],
        transport: T,
        options: WatchOptions,
        cancel: CancellationToken,
    ) -> Result<()> {
        let outcome = self.seed(names).await?;

        let watched: Vec<&str> = outcome
            .watch_set
            .keys()
            .filter_map(|k| skill_name_from_group(&k.group))
            .collect();
        info!(skills = ?watched, "listening for changes");

        let mut watch_loop = WatchLoop::new(
            outcome.watch_set,
            transport,
            Arc::clone(&self.store),
            self.handler(),
            options,
        );
        watch_loop.run(cancel).await
    }
}

/// Names of every skill published in the client's namespace.
pub async fn discover_skills(client: &NacosClient) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut page_no = 1;

    loop {
        let page = client
            .list_configs(SKILL_DATA_ID, "skill_*", page_no, DISCOVERY_PAGE_SIZE)
            .await?;

        names.extend(
            page.page_items
                .iter()
                .filter(|item| item.data_id == SKILL_DATA_ID)
                .filter_map(|item| skill_name_from_group(item.group()))
                .map(str::to_string),
        );

        if page.page_items.is_empty() || page_no >= page.pages_available {
            break;
        }
        page_no += 1;
    }

    names.sort();
    names.dedup();
    Ok(names)
}
