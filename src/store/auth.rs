// src/store/auth.rs

//! Username/password session for the remote store.
//!
//! The server hands out an access token with an optional TTL. Newer servers
//! expose the v3 login endpoint, older ones only v1; whichever works first is
//! remembered and also decides which listing API the client uses.
//!
//! A failed login is not fatal: servers with auth disabled accept anonymous
//! requests, so callers just proceed without a token.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{Result, SkillwatchError};

/// Refresh the token when it expires within this margin.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5);

/// After a failed login, requests go out anonymously for this long before
/// login is attempted again.
pub const LOGIN_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Connection settings for the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// `host:port`, without scheme.
    pub server_addr: String,
    /// Namespace (tenant) the records live in.
    pub namespace: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ServerSettings {
    pub fn anonymous(server_addr: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            namespace: namespace.into(),
            username: None,
            password: None,
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Which generation of the server API accepted our login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V3,
}

impl ApiVersion {
    fn login_path(self) -> &'static str {
        match self {
            ApiVersion::V3 => "/nacos/v3/auth/user/login",
            ApiVersion::V1 => "/nacos/v1/auth/login",
        }
    }
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    expires_at: Option<Instant>,
    api_version: Option<ApiVersion>,
    last_failure: Option<Instant>,
}

impl TokenState {
    fn needs_refresh(&self) -> bool {
        if let Some(failed_at) = self.last_failure {
            if failed_at.elapsed() < LOGIN_RETRY_INTERVAL {
                return false;
            }
        }
        match (&self.access_token, self.expires_at) {
            (None, _) => true,
            (Some(_), Some(at)) => Instant::now() + TOKEN_REFRESH_MARGIN >= at,
            (Some(_), None) => false,
        }
    }
}

/// Token returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginToken {
    pub access_token: String,
    pub ttl: Option<Duration>,
}

/// Shared authentication state for the fetch client and the listener.
#[derive(Debug)]
pub struct Session {
    settings: ServerSettings,
    http: reqwest::Client,
    state: Mutex<TokenState>,
}

impl Session {
    pub fn new(settings: ServerSettings, http: reqwest::Client) -> Self {
        Self {
            settings,
            http,
            state: Mutex::new(TokenState::default()),
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// API generation that accepted the last login, if any.
    pub async fn api_version(&self) -> Option<ApiVersion> {
        self.state.lock().await.api_version
    }

    /// Current access token, logging in or refreshing first when needed.
    ///
    /// Returns `None` for anonymous settings or when login failed.
    pub async fn access_token(&self) -> Option<String> {
        let (username, password) = self.settings.credentials()?;

        let mut state = self.state.lock().await;
        if state.needs_refresh() {
            if let Err(e) = self.login_locked(&mut state, username, password).await {
                warn!(error = %e, "login failed; continuing without access token");
            }
        }
        state.access_token.clone()
    }

    /// Force a fresh login.
    pub async fn login(&self) -> Result<()> {
        let Some((username, password)) = self.settings.credentials() else {
            debug!("no credentials configured; skipping login");
            return Ok(());
        };
        let mut state = self.state.lock().await;
        self.login_locked(&mut state, username, password).await
    }

    async fn login_locked(
        &self,
        state: &mut TokenState,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let candidates: &[ApiVersion] = match state.api_version {
            Some(ApiVersion::V1) => &[ApiVersion::V1],
            _ => &[ApiVersion::V3, ApiVersion::V1],
        };

        let mut last_err = None;
        for &version in candidates {
            match self.try_login(version, username, password).await {
                Ok(token) => {
                    info!(api = ?version, ttl_secs = token.ttl.map(|d| d.as_secs()), "logged in");
                    state.expires_at = token.ttl.map(|ttl| Instant::now() + ttl);
                    state.access_token = Some(token.access_token);
                    state.api_version = Some(version);
                    state.last_failure = None;
                    return Ok(());
                }
                Err(e) => {
                    debug!(api = ?version, error = %e, "login attempt failed");
                    last_err = Some(e);
                }
            }
        }

        state.last_failure = Some(Instant::now());
        Err(last_err.unwrap_or_else(|| SkillwatchError::transport(None, "no login endpoint tried")))
    }

    async fn try_login(
        &self,
        version: ApiVersion,
        username: &str,
        password: &str,
    ) -> Result<LoginToken> {
        let url = format!("http://{}{}", self.settings.server_addr, version.login_path());
        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| SkillwatchError::transport(None, e.to_string()))?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(SkillwatchError::transport(
                Some(status.as_u16()),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        parse_login_response(&body).ok_or_else(|| {
            SkillwatchError::MalformedResponse("login response has no accessToken".to_string())
        })
    }
}

/// Extract the token from a login answer.
///
/// Accepts both `{"accessToken": ..., "tokenTtl": ...}` and the same object
/// wrapped in `{"data": {...}}`.
pub fn parse_login_response(body: &[u8]) -> Option<LoginToken> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let obj = match value.get("data") {
        Some(data) if data.is_object() => data,
        _ => &value,
    };

    let access_token = obj.get("accessToken")?.as_str()?;
    if access_token.is_empty() {
        return None;
    }

    let ttl = obj
        .get("tokenTtl")
        .and_then(Value::as_f64)
        .filter(|secs| *secs > 0.0)
        .map(Duration::from_secs_f64);

    Some(LoginToken {
        access_token: access_token.to_string(),
        ttl,
    })
}
