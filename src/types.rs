// src/types.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the capability traits (`ConfigStore`, `Mirror`,
/// `ChangeHandler`, `LongPollTransport`) so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity of one entry in the remote store.
///
/// The triple `(data_id, group, tenant)` is the identity; `tenant` is empty
/// for the server's default scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
}

impl ConfigKey {
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

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tenant.is_empty() {
            write!(f, "{}/{}", self.group, self.data_id)
        } else {
            write!(f, "{}:{}/{}", self.tenant, self.group, self.data_id)
        }
    }
}
