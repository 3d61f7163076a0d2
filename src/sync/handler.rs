// src/sync/handler.rs

use tracing::{info, warn};

use crate::errors::Result;
use crate::mirror::{skill_name_from_group, Mirror};
use crate::types::BoxFuture;
use crate::watch::{ChangeEvent, ChangeHandler, ChangeKind};

/// Keeps the local mirror in line with changes the watch loop reports.
///
/// - `Deleted`: remove the skill's local directory.
/// - `Updated`: re-fetch every entry of the skill and rewrite it locally.
///
/// Failures are returned to the loop so the fingerprint is not advanced and
/// the change is retried the next time the server reports it.
#[derive(Debug, Clone)]
pub struct MirrorHandler<M> {
    mirror: M,
}

impl<M: Mirror> MirrorHandler<M> {
    pub fn new(mirror: M) -> Self {
        Self { mirror }
    }
}

impl<M: Mirror> ChangeHandler for MirrorHandler<M> {
    fn handle<'a>(&'a mut self, event: &'a ChangeEvent) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(name) = skill_name_from_group(&event.key.group) else {
                warn!(key = %event.key, "change for a group that is not a skill; ignoring");
                return Ok(());
            };

            match event.kind {
                ChangeKind::Deleted => {
                    info!(skill = %name, "skill deleted remotely; removing local copy");
                    if !self.mirror.remove(name)? {
                        info!(skill = %name, "no local copy to remove");
                    }
                }
                ChangeKind::Updated => {
                    info!(skill = %name, "skill changed; syncing");
                    let path = self.mirror.materialize(name).await?;
                    info!(skill = %name, path = ?path, "skill synced");
                }
            }
            Ok(())
        })
    }
}
