// src/mirror/mod.rs

//! Local mirror of remote records.
//!
//! A record ("skill") is stored remotely as several entries; materializing it
//! rebuilds the whole record as a directory under the output root.
//!
//! - [`Mirror`] is the capability the sync orchestrator depends on.
//! - [`skill`] is the production implementation for skills.

pub mod skill;

pub use skill::{
    RetryPolicy, SkillDocument, SkillMirror, resource_data_id, skill_group, skill_key,
    skill_name_from_group, GROUP_PREFIX, SKILL_DATA_ID,
};

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::Result;
use crate::types::BoxFuture;

/// Materialize or remove the local copy of a record.
pub trait Mirror: Send + Sync {
    /// Fetch every entry of `record` and (re)write its local directory.
    /// Returns the directory written.
    fn materialize<'a>(&'a self, record: &'a str) -> BoxFuture<'a, Result<PathBuf>>;

    /// Delete the local directory of `record`. Returns whether it existed.
    fn remove(&self, record: &str) -> Result<bool>;

    /// Where `record` lives locally.
    fn record_path(&self, record: &str) -> PathBuf;

    fn exists(&self, record: &str) -> bool;
}

impl<M: Mirror + ?Sized> Mirror for Arc<M> {
    fn materialize<'a>(&'a self, record: &'a str) -> BoxFuture<'a, Result<PathBuf>> {
        (**self).materialize(record)
    }

    fn remove(&self, record: &str) -> Result<bool> {
        (**self).remove(record)
    }

    fn record_path(&self, record: &str) -> PathBuf {
        (**self).record_path(record)
    }

    fn exists(&self, record: &str) -> bool {
        (**self).exists(record)
    }
}
