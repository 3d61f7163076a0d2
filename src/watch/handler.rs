// src/watch/handler.rs

//! Caller-supplied reaction to a resolved change.
//!
//! The watch loop talks to a `ChangeHandler` instead of a bare closure. The
//! sync orchestrator provides the production implementation
//! (`sync::MirrorHandler`); tests provide handlers that record calls or fail
//! on demand.

use crate::errors::Result;
use crate::types::{BoxFuture, ConfigKey};

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The entry has new content.
    Updated,
    /// The entry was deleted from the store.
    Deleted,
}

/// A change the handler should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: ConfigKey,
    pub kind: ChangeKind,
}

/// Reaction to a changed entry.
///
/// Returning an error leaves the entry's fingerprint untouched, so the same
/// change is dispatched again the next time the server reports the key.
pub trait ChangeHandler: Send {
    fn handle<'a>(&'a mut self, event: &'a ChangeEvent) -> BoxFuture<'a, Result<()>>;
}
