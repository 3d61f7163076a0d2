// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::loader::expand_tilde;
use crate::mirror::RetryPolicy;
use crate::store::ServerSettings;
use crate::watch::WatchOptions;

/// Port used when neither `port` nor `host` names one.
pub const DEFAULT_PORT: u16 = 8848;

/// Host used when neither the file nor the CLI names one.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Credentials used when none are configured.
pub const DEFAULT_USERNAME: &str = "nacos";
pub const DEFAULT_PASSWORD: &str = "nacos";

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// host = "127.0.0.1"
/// port = 8848
/// namespace = ""
/// username = "nacos"
/// password = "nacos"
///
/// [sync]
/// output_dir = "~/.skills"
///
/// [watch]
/// long_poll_timeout_ms = 30000
/// request_timeout_ms = 35000
/// retry_backoff_ms = 5000
/// ```
///
/// All sections are optional and have reasonable defaults. This type is not
/// validated; convert it into a [`ConfigFile`] via `TryFrom`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    /// Host name, optionally with `:port`.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Empty selects the server's default namespace.
    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// `[sync]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncSection {
    /// Root of the local mirror. Default: `~/.skills`.
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Long-poll window requested from the server.
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,

    /// Client I/O timeout of the long-poll call; must exceed the window.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_materialize_retries")]
    pub materialize_retries: u32,

    #[serde(default = "default_materialize_retry_delay_ms")]
    pub materialize_retry_delay_ms: u64,
}

fn default_long_poll_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    35_000
}

fn default_retry_backoff_ms() -> u64 {
    5_000
}

fn default_materialize_retries() -> u32 {
    3
}

fn default_materialize_retry_delay_ms() -> u64 {
    3_000
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            materialize_retries: default_materialize_retries(),
            materialize_retry_delay_ms: default_materialize_retry_delay_ms(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub sync: SyncSection,
    pub watch: WatchSection,
}

impl ConfigFile {
    /// Construct without validation. Only `validate.rs` should call this.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            server: raw.server,
            sync: raw.sync,
            watch: raw.watch,
        }
    }

    /// `host:port` of the store.
    ///
    /// A host that already carries a port is used verbatim unless `port` is
    /// set explicitly.
    pub fn server_addr(&self) -> String {
        let host = self
            .server
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST);
        match self.server.port {
            Some(port) => format!("{}:{}", host.split(':').next().unwrap_or(host), port),
            None if host.contains(':') => host.to_string(),
            None => format!("{host}:{DEFAULT_PORT}"),
        }
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            server_addr: self.server_addr(),
            namespace: self.server.namespace.clone(),
            username: Some(
                self.server
                    .username
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            ),
            password: Some(
                self.server
                    .password
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            ),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.sync.output_dir {
            Some(dir) => expand_tilde(dir),
            None => expand_tilde("~/.skills"),
        }
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.long_poll_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.request_timeout_ms)
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            retry_backoff: Duration::from_millis(self.watch.retry_backoff_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.watch.materialize_retries,
            delay: Duration::from_millis(self.watch.materialize_retry_delay_ms),
        }
    }
}
