// tests/http_store.rs
//
// NacosClient and HttpLongPoll against an in-process axum server.

mod common;
use crate::common::{init_tracing, with_timeout};

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::json;

use skillwatch::cli::CliArgs;
use skillwatch::errors::SkillwatchError;
use skillwatch::store::auth::{parse_login_response, ApiVersion};
use skillwatch::store::{NacosClient, ServerSettings};
use skillwatch::sync::discover_skills;
use skillwatch::types::ConfigKey;
use skillwatch::watch::protocol::encode_listening_configs;
use skillwatch::watch::{fingerprint, ChangeNotification, LongPollTransport, WatchSet};

type TestResult = Result<(), Box<dyn Error>>;

type Params = HashMap<String, String>;

async fn spawn_server(router: Router) -> Result<SocketAddr, Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

fn anonymous(addr: SocketAddr) -> Result<NacosClient, SkillwatchError> {
    NacosClient::new(ServerSettings::anonymous(addr.to_string(), "public"))
}

fn with_login(addr: SocketAddr) -> Result<NacosClient, SkillwatchError> {
    NacosClient::new(ServerSettings {
        server_addr: addr.to_string(),
        namespace: "public".to_string(),
        username: Some("nacos".to_string()),
        password: Some("nacos".to_string()),
    })
}

fn skill_alpha() -> ConfigKey {
    ConfigKey::new("skill.json", "skill_alpha", "public")
}

/// `GET /nacos/v1/cs/configs` serving a single entry.
async fn config_endpoint(Query(q): Query<Params>) -> (StatusCode, String) {
    let hit = q.get("dataId").map(String::as_str) == Some("skill.json")
        && q.get("group").map(String::as_str) == Some("skill_alpha")
        && q.get("tenant").map(String::as_str) == Some("public");
    if hit {
        (StatusCode::OK, r#"{"name":"alpha"}"#.to_string())
    } else {
        (StatusCode::NOT_FOUND, "config data not exist".to_string())
    }
}

#[tokio::test]
async fn get_config_returns_content_or_not_found() -> TestResult {
    init_tracing();

    let addr = spawn_server(Router::new().route("/nacos/v1/cs/configs", get(config_endpoint))).await?;
    let client = anonymous(addr)?;

    assert_eq!(client.get_config(&skill_alpha()).await?, r#"{"name":"alpha"}"#);

    let err = client
        .get_config(&ConfigKey::new("skill.json", "skill_ghost", "public"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn server_errors_are_transport_failures() -> TestResult {
    init_tracing();

    let router = Router::new().route(
        "/nacos/v1/cs/configs",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()) }),
    );
    let addr = spawn_server(router).await?;

    let err = anonymous(addr)?.get_config(&skill_alpha()).await.unwrap_err();
    assert!(matches!(
        err,
        SkillwatchError::Transport { status: Some(500), ref body } if body == "boom"
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() -> TestResult {
    init_tracing();

    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?
    };

    let err = anonymous(addr)?.get_config(&skill_alpha()).await.unwrap_err();
    assert!(matches!(err, SkillwatchError::Transport { status: None, .. }));
    Ok(())
}

#[tokio::test]
async fn login_falls_back_to_v1_and_token_is_sent() -> TestResult {
    init_tracing();

    let seen_tokens: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let seen = Arc::clone(&seen_tokens);

    let router = Router::new()
        .route(
            "/nacos/v1/auth/login",
            post(|Form(f): Form<Params>| async move {
                if f.get("username").map(String::as_str) == Some("nacos") {
                    (StatusCode::OK, Json(json!({ "accessToken": "tok-1", "tokenTtl": 18000 })))
                } else {
                    (StatusCode::FORBIDDEN, Json(json!({})))
                }
            }),
        )
        .route(
            "/nacos/v1/cs/configs",
            get(move |Query(q): Query<Params>| async move {
                seen.lock().unwrap().push(q.get("accessToken").cloned());
                config_endpoint(Query(q)).await
            }),
        );
    let addr = spawn_server(router).await?;

    let client = with_login(addr)?;
    client.session().login().await?;
    assert_eq!(client.session().api_version().await, Some(ApiVersion::V1));

    client.get_config(&skill_alpha()).await?;
    assert_eq!(*seen_tokens.lock().unwrap(), vec![Some("tok-1".to_string())]);
    Ok(())
}

#[tokio::test]
async fn failed_login_is_reported_but_requests_still_go_out() -> TestResult {
    init_tracing();

    let router = Router::new().route("/nacos/v1/cs/configs", get(config_endpoint));
    let addr = spawn_server(router).await?;

    let client = with_login(addr)?;
    assert!(client.session().login().await.is_err());
    // Anonymous fallback.
    assert_eq!(client.get_config(&skill_alpha()).await?, r#"{"name":"alpha"}"#);
    Ok(())
}

#[tokio::test]
async fn failed_login_is_not_retried_on_every_request() -> TestResult {
    init_tracing();

    let login_hits: Arc<Mutex<Vec<String>>> = Arc::default();
    let v3_hits = Arc::clone(&login_hits);
    let v1_hits = Arc::clone(&login_hits);

    let router = Router::new()
        .route(
            "/nacos/v3/auth/user/login",
            post(move || async move {
                v3_hits.lock().unwrap().push("v3".to_string());
                StatusCode::INTERNAL_SERVER_ERROR
            }),
        )
        .route(
            "/nacos/v1/auth/login",
            post(move || async move {
                v1_hits.lock().unwrap().push("v1".to_string());
                StatusCode::FORBIDDEN
            }),
        )
        .route("/nacos/v1/cs/configs", get(config_endpoint));
    let addr = spawn_server(router).await?;

    let client = with_login(addr)?;
    for _ in 0..3 {
        assert_eq!(client.get_config(&skill_alpha()).await?, r#"{"name":"alpha"}"#);
    }

    assert_eq!(*login_hits.lock().unwrap(), vec!["v3", "v1"]);
    assert_eq!(client.session().api_version().await, None);
    Ok(())
}

#[test]
fn login_response_parsing() {
    let token = parse_login_response(br#"{"accessToken":"abc","tokenTtl":18000,"globalAdmin":true}"#)
        .expect("token");
    assert_eq!(token.access_token, "abc");
    assert_eq!(token.ttl, Some(Duration::from_secs(18000)));

    let wrapped = parse_login_response(br#"{"code":0,"data":{"accessToken":"xyz"}}"#).expect("token");
    assert_eq!(wrapped.access_token, "xyz");
    assert_eq!(wrapped.ttl, None);

    assert!(parse_login_response(br#"{"accessToken":""}"#).is_none());
    assert!(parse_login_response(b"not json").is_none());
}

#[tokio::test]
async fn discovery_pages_through_v1_listing() -> TestResult {
    init_tracing();

    let router = Router::new().route(
        "/nacos/v1/cs/configs",
        get(|Query(q): Query<Params>| async move {
            assert_eq!(q.get("search").map(String::as_str), Some("blur"));
            assert_eq!(q.get("group").map(String::as_str), Some("skill_*"));
            assert_eq!(q.get("tenant").map(String::as_str), Some("public"));
            let page = match q.get("pageNo").map(String::as_str) {
                Some("1") => json!({
                    "totalCount": 4, "pageNumber": 1, "pagesAvailable": 2,
                    "pageItems": [
                        { "dataId": "skill.json", "group": "skill_beta" },
                        { "dataId": "skill.json", "group": "skill_alpha" }
                    ]
                }),
                _ => json!({
                    "totalCount": 4, "pageNumber": 2, "pagesAvailable": 2,
                    "pageItems": [
                        { "dataId": "skill.json", "group": "skill_alpha" },
                        { "dataId": "resource_x_y.json", "group": "skill_gamma" }
                    ]
                }),
            };
            Json(page)
        }),
    );
    let addr = spawn_server(router).await?;

    // No v3 route: the anonymous client falls back to v1.
    let names = discover_skills(&anonymous(addr)?).await?;
    assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    Ok(())
}

#[tokio::test]
async fn run_with_all_and_nothing_published_exits_cleanly() -> TestResult {
    init_tracing();

    let router = Router::new().route(
        "/nacos/v3/admin/cs/config/list",
        get(|Query(q): Query<Params>| async move {
            // Default namespace is sent as no namespace at all.
            assert!(!q.contains_key("namespaceId"));
            Json(json!({ "code": 0, "message": "success", "data": {
                "totalCount": 0, "pageNumber": 1, "pagesAvailable": 0, "pageItems": []
            }}))
        }),
    );
    let addr = spawn_server(router).await?;
    let out = tempfile::tempdir()?;
    let host = addr.to_string();
    let out_dir = out.path().to_string_lossy().to_string();

    let args = CliArgs::try_parse_from([
        "skillwatch",
        "--all",
        "--host",
        host.as_str(),
        "-o",
        out_dir.as_str(),
    ])?;
    with_timeout(skillwatch::run(args)).await?;

    assert!(std::fs::read_dir(out.path())?.next().is_none());
    Ok(())
}

#[tokio::test]
async fn v3_listing_uses_envelope_and_bearer_token() -> TestResult {
    init_tracing();

    let router = Router::new()
        .route(
            "/nacos/v3/auth/user/login",
            post(|| async { Json(json!({ "accessToken": "v3-tok", "tokenTtl": 18000 })) }),
        )
        .route(
            "/nacos/v3/admin/cs/config/list",
            get(|headers: HeaderMap, Query(q): Query<Params>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                assert_eq!(auth, "Bearer v3-tok");
                assert_eq!(q.get("namespaceId").map(String::as_str), Some("public"));
                Json(json!({
                    "code": 0,
                    "message": "success",
                    "data": {
                        "totalCount": 1, "pageNumber": 1, "pagesAvailable": 1,
                        "pageItems": [ { "dataId": "skill.json", "groupName": "skill_delta" } ]
                    }
                }))
            }),
        );
    let addr = spawn_server(router).await?;

    let client = with_login(addr)?;
    client.session().login().await?;
    assert_eq!(client.session().api_version().await, Some(ApiVersion::V3));

    let page = client.list_configs("skill.json", "skill_*", 1, 500).await?;
    assert_eq!(page.page_items.len(), 1);
    assert_eq!(page.page_items[0].group(), "skill_delta");
    Ok(())
}

#[tokio::test]
async fn listener_sends_header_and_encoded_watch_set() -> TestResult {
    init_tracing();

    let seen: Arc<Mutex<Vec<(Option<String>, Option<String>)>>> = Arc::default();
    let record = Arc::clone(&seen);

    let router = Router::new().route(
        "/nacos/v1/cs/configs/listener",
        post(move |headers: HeaderMap, Form(f): Form<Params>| async move {
            let header = headers
                .get("Long-Pulling-Timeout")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            record
                .lock()
                .unwrap()
                .push((header, f.get("Listening-Configs").cloned()));
            "skill.json%02skill_alpha%02%02public%01".to_string()
        }),
    );
    let addr = spawn_server(router).await?;

    let mut set = WatchSet::new();
    set.insert(skill_alpha(), Some(fingerprint(b"v1")));
    set.insert(ConfigKey::new("skill.json", "skill_beta", "public"), None);

    let client = anonymous(addr)?;
    let mut listener = client.listener(Duration::from_millis(1500), Duration::from_secs(5));
    let changes = listener.poll(&set).await?;

    assert_eq!(
        changes,
        vec![ChangeNotification::new("skill.json", "skill_alpha", "public")]
    );
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("1500"));
    assert_eq!(seen[0].1, Some(encode_listening_configs(&set)));
    Ok(())
}

#[tokio::test]
async fn listener_empty_body_means_no_changes() -> TestResult {
    init_tracing();

    let router = Router::new().route("/nacos/v1/cs/configs/listener", post(|| async { "" }));
    let addr = spawn_server(router).await?;

    let mut set = WatchSet::new();
    set.insert(skill_alpha(), None);

    let client = anonymous(addr)?;
    let mut listener = client.listener(Duration::from_millis(1500), Duration::from_secs(5));
    assert!(listener.poll(&set).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn listener_gives_up_after_request_timeout() -> TestResult {
    init_tracing();

    let router = Router::new().route(
        "/nacos/v1/cs/configs/listener",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            ""
        }),
    );
    let addr = spawn_server(router).await?;

    let mut set = WatchSet::new();
    set.insert(skill_alpha(), None);

    let client = anonymous(addr)?;
    let mut listener = client.listener(Duration::from_millis(100), Duration::from_millis(300));
    let err = listener.poll(&set).await.unwrap_err();
    assert!(matches!(err, SkillwatchError::Transport { status: None, .. }));
    Ok(())
}

#[tokio::test]
async fn listener_reports_http_status() -> TestResult {
    init_tracing();

    let router = Router::new().route(
        "/nacos/v1/cs/configs/listener",
        post(|| async { (StatusCode::FORBIDDEN, "no permission") }),
    );
    let addr = spawn_server(router).await?;

    let mut set = WatchSet::new();
    set.insert(skill_alpha(), None);

    let client = anonymous(addr)?;
    let mut listener = client.listener(Duration::from_millis(1500), Duration::from_secs(5));
    let err = listener.poll(&set).await.unwrap_err();
    assert!(matches!(err, SkillwatchError::Transport { status: Some(403), .. }));
    Ok(())
}
