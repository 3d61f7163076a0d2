// src/watch/transport.rs

//! Long-poll transport abstraction.
//!
//! The watch loop talks to a `LongPollTransport` so the HTTP listener can be
//! swapped for a scripted transport in tests.
//!
//! Cancellation: the loop races `poll` against its cancellation token and
//! drops the future when the token fires. Dropping an in-flight
//! [`HttpLongPoll`] request aborts the underlying connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::errors::{Result, SkillwatchError};
use crate::store::Session;
use crate::types::BoxFuture;
use crate::watch::protocol::{decode_changed_configs, encode_listening_configs};
use crate::watch::resolver::ChangeNotification;
use crate::watch::watch_set::WatchSet;

/// Header carrying the long-poll window the client asks the server for.
pub const LONG_POLL_TIMEOUT_HEADER: &str = "Long-Pulling-Timeout";

/// Form field carrying the encoded watch set.
pub const LISTENING_CONFIGS_FIELD: &str = "Listening-Configs";

/// Default server-side long-poll window.
pub const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default client-side I/O timeout; strictly longer than the long-poll window
/// so the server can answer at the boundary.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(35_000);

/// One blocking "has anything changed?" call.
///
/// `Ok(vec![])` is the normal "nothing changed" outcome of a long-poll cycle.
pub trait LongPollTransport: Send {
    fn poll<'a>(
        &'a mut self,
        watch_set: &'a WatchSet,
    ) -> BoxFuture<'a, Result<Vec<ChangeNotification>>>;
}

/// Long-poll listener over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLongPoll {
    http: reqwest::Client,
    session: Arc<Session>,
    long_poll_timeout: Duration,
    request_timeout: Duration,
}

impl HttpLongPoll {
    pub fn new(
        http: reqwest::Client,
        session: Arc<Session>,
        long_poll_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            session,
            long_poll_timeout,
            request_timeout,
        }
    }

    fn listener_url(&self) -> String {
        format!(
            "http://{}/nacos/v1/cs/configs/listener",
            self.session.settings().server_addr
        )
    }

    async fn poll_once(&self, watch_set: &WatchSet) -> Result<Vec<ChangeNotification>> {
        let token = self.session.access_token().await;

        let mut request = self
            .http
            .post(self.listener_url())
            .timeout(self.request_timeout)
            .header(
                LONG_POLL_TIMEOUT_HEADER,
                self.long_poll_timeout.as_millis().to_string(),
            )
            .form(&[(LISTENING_CONFIGS_FIELD, encode_listening_configs(watch_set))]);

        if let Some(token) = token {
            request = request.query(&[("accessToken", token)]);
        }

        debug!(entries = watch_set.len(), "long-poll request sent");

        let response = request
            .send()
            .await
            .map_err(|e| SkillwatchError::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SkillwatchError::transport(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(SkillwatchError::transport(Some(status.as_u16()), body));
        }

        if body.trim().is_empty() {
            trace!("long-poll window elapsed with no changes");
            return Ok(Vec::new());
        }

        decode_changed_configs(&body)
    }
}

impl LongPollTransport for HttpLongPoll {
    fn poll<'a>(
        &'a mut self,
        watch_set: &'a WatchSet,
    ) -> BoxFuture<'a, Result<Vec<ChangeNotification>>> {
        Box::pin(self.poll_once(watch_set))
    }
}
