// src/store/mod.rs

//! Access to the remote configuration store.
//!
//! - [`ConfigStore`] is the single-entry fetch capability the watch engine and
//!   the mirror depend on.
//! - [`client`] is the HTTP implementation (`NacosClient`) used in production.
//! - [`auth`] holds the username/password session shared by the client and
//!   the long-poll listener.

pub mod auth;
pub mod client;

pub use auth::{ServerSettings, Session};
pub use client::{ConfigPage, ConfigSummary, NacosClient};

use std::sync::Arc;

use crate::errors::Result;
use crate::types::{BoxFuture, ConfigKey};

/// Fetch the current content of one entry.
///
/// An absent entry must be reported as `SkillwatchError::NotFound` so that
/// callers can tell deletion apart from failure.
pub trait ConfigStore: Send + Sync {
    fn fetch<'a>(&'a self, key: &'a ConfigKey) -> BoxFuture<'a, Result<String>>;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn fetch<'a>(&'a self, key: &'a ConfigKey) -> BoxFuture<'a, Result<String>> {
        (**self).fetch(key)
    }
}
