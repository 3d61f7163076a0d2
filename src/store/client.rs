// src/store/client.rs

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::errors::{Result, SkillwatchError};
use crate::store::auth::{ApiVersion, ServerSettings, Session};
use crate::store::ConfigStore;
use crate::types::{BoxFuture, ConfigKey};
use crate::watch::transport::HttpLongPoll;

const USER_AGENT: &str = concat!("skillwatch/", env!("CARGO_PKG_VERSION"));

/// Timeout for the short request/response calls (fetch, list, login).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One entry of a config listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub data_id: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub group_name: String,
}

impl ConfigSummary {
    /// v3 listings fill `groupName`, v1 listings fill `group`.
    pub fn group(&self) -> &str {
        if self.group_name.is_empty() {
            &self.group
        } else {
            &self.group_name
        }
    }
}

/// One page of a config listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPage {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub pages_available: usize,
    #[serde(default)]
    pub page_items: Vec<ConfigSummary>,
}

#[derive(Debug, Deserialize)]
struct V3Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Plain request/response client for the remote store.
#[derive(Debug, Clone)]
pub struct NacosClient {
    http: reqwest::Client,
    session: Arc<Session>,
}

impl NacosClient {
    pub fn new(settings: ServerSettings) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let session = Arc::new(Session::new(settings, http.clone()));
        Ok(Self { http, session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn namespace(&self) -> &str {
        &self.session.settings().namespace
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.session.settings().server_addr, path)
    }

    /// Long-poll listener sharing this client's connection pool and session.
    pub fn listener(&self, long_poll_timeout: Duration, request_timeout: Duration) -> HttpLongPoll {
        HttpLongPoll::new(
            self.http.clone(),
            Arc::clone(&self.session),
            long_poll_timeout,
            request_timeout,
        )
    }

    /// Fetch the content of one entry.
    ///
    /// A 404 (or a body saying the entry does not exist) becomes
    /// `SkillwatchError::NotFound`.
    pub async fn get_config(&self, key: &ConfigKey) -> Result<String> {
        let mut params = vec![("dataId", key.data_id.clone()), ("group", key.group.clone())];
        if !key.tenant.is_empty() {
            params.push(("tenant", key.tenant.clone()));
        }
        if let Some(token) = self.session.access_token().await {
            params.push(("accessToken", token));
        }

        trace!(key = %key, "fetching config");
        let response = self
            .http
            .get(self.url("/nacos/v1/cs/configs"))
            .timeout(REQUEST_TIMEOUT)
            .query(&params)
            .send()
            .await
            .map_err(|e| SkillwatchError::transport(None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SkillwatchError::transport(Some(status.as_u16()), e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND || (!status.is_success() && body.contains("not exist")) {
            return Err(SkillwatchError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(SkillwatchError::transport(Some(status.as_u16()), body));
        }

        Ok(body)
    }

    /// List configs matching a data-id and a group pattern (`*` wildcards).
    ///
    /// Uses the v3 admin API unless login settled on v1. Without a login, a
    /// 404 from the v3 endpoint falls back to v1.
    pub async fn list_configs(
        &self,
        data_id: &str,
        group_pattern: &str,
        page_no: usize,
        page_size: usize,
    ) -> Result<ConfigPage> {
        let query = ListQuery {
            data_id,
            group_pattern,
            page_no,
            page_size,
        };
        let token = self.session.access_token().await;

        let page = match self.session.api_version().await {
            Some(ApiVersion::V1) => self.list_v1(&query, token).await?,
            Some(ApiVersion::V3) => self.list_v3(&query, token).await?,
            None => match self.list_v3(&query, token.clone()).await {
                Err(SkillwatchError::Transport {
                    status: Some(404), ..
                }) => {
                    debug!("v3 listing unavailable; falling back to v1");
                    self.list_v1(&query, token).await?
                }
                other => other?,
            },
        };

        debug!(
            data_id,
            group_pattern,
            items = page.page_items.len(),
            total = page.total_count,
            "listed configs"
        );
        Ok(page)
    }

    async fn list_v1(&self, query: &ListQuery<'_>, token: Option<String>) -> Result<ConfigPage> {
        let mut params = vec![
            ("search", query.search_mode().to_string()),
            ("dataId", query.data_id.to_string()),
            ("group", query.group_pattern.to_string()),
            ("pageNo", query.page_no.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if !self.namespace().is_empty() {
            params.push(("tenant", self.namespace().to_string()));
        }
        if let Some(token) = token {
            params.push(("accessToken", token));
        }

        let response = self
            .http
            .get(self.url("/nacos/v1/cs/configs"))
            .timeout(REQUEST_TIMEOUT)
            .query(&params)
            .send()
            .await
            .map_err(|e| SkillwatchError::transport(None, e.to_string()))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SkillwatchError::transport(Some(status.as_u16()), body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn list_v3(&self, query: &ListQuery<'_>, token: Option<String>) -> Result<ConfigPage> {
        let mut params = vec![
            ("search", query.search_mode().to_string()),
            ("dataId", query.data_id.to_string()),
            ("groupName", query.group_pattern.to_string()),
            ("pageNo", query.page_no.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if !self.namespace().is_empty() {
            params.push(("namespaceId", self.namespace().to_string()));
        }

        let mut request = self
            .http
            .get(self.url("/nacos/v3/admin/cs/config/list"))
            .timeout(REQUEST_TIMEOUT)
            .query(&params);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SkillwatchError::transport(None, e.to_string()))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SkillwatchError::transport(Some(status.as_u16()), body));
        }

        let envelope: V3Envelope<ConfigPage> = serde_json::from_str(&body)?;
        if envelope.code != 0 {
            return Err(SkillwatchError::transport(
                Some(status.as_u16()),
                format!("code={}, message={}", envelope.code, envelope.message),
            ));
        }
        Ok(envelope.data.unwrap_or(ConfigPage {
            total_count: 0,
            page_number: query.page_no,
            pages_available: 0,
            page_items: Vec::new(),
        }))
    }
}

struct ListQuery<'a> {
    data_id: &'a str,
    group_pattern: &'a str,
    page_no: usize,
    page_size: usize,
}

impl ListQuery<'_> {
    fn search_mode(&self) -> &'static str {
        if self.data_id.contains('*') || self.group_pattern.contains('*') {
            "blur"
        } else {
            "accurate"
        }
    }
}

impl ConfigStore for NacosClient {
    fn fetch<'a>(&'a self, key: &'a ConfigKey) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.get_config(key))
    }
}
