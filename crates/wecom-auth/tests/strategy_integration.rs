//! Integration tests for the WeCom login strategy
//!
//! **Purpose**: Drive whole login attempts through the real HTTP client
//!
//! **Coverage:**
//! - Redirect: entry mode selection, relative callback resolution
//! - Callback: token → code exchange → profile → verifier
//! - Service token reuse across logins and across store instances
//! - Provider rejections surfacing as Error outcomes
//!
//! **Infrastructure:**
//! - WireMock HTTP server (simulates the WeCom API)
//! - `MemoryTokenStore` / `FileTokenStore` (tempdir)

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use serde_json::json;
use support::{
    config_for, mount_token, mount_user_get, mount_user_info, DirectoryVerifier, Member, AGENT_ID,
    CORP_ID, SERVICE_TOKEN,
};
use url::Url;
use wecom_auth::auth::AuthenticateOptions;
use wecom_auth::{
    AuthError, AuthOutcome, AuthRequest, ErrorKind, FileTokenStore, MemoryTokenStore, TokenStore,
    WeComStrategy,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn verifier() -> DirectoryVerifier {
    DirectoryVerifier { blocked: vec!["blocked".to_string()] }
}

fn query_of(location: &str) -> Vec<(String, String)> {
    Url::parse(location).unwrap().query_pairs().into_owned().collect()
}

#[tokio::test]
async fn test_redirect_from_desktop_browser() {
    support::init_tracing();
    let server = MockServer::start().await;
    let strategy = WeComStrategy::new(
        config_for(&server).with_state("login-1").with_authorize_param("lang", "zh"),
        verifier(),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap();
    let request = AuthRequest::new("/auth/wecom?lang=en")
        .with_header("User-Agent", "Mozilla/5.0 (Macintosh) Chrome/120.0");

    let outcome = strategy.authenticate(&request, &AuthenticateOptions::default()).await;

    let AuthOutcome::Redirect { location, status } = outcome else { panic!("expected redirect") };
    assert_eq!(status, 302);
    assert!(location.starts_with("https://open.work.weixin.qq.com/wwopen/sso/qrConnect?"));

    let query = query_of(&location);
    let get = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    assert_eq!(get("appid"), Some(CORP_ID));
    assert_eq!(get("agentid"), Some(AGENT_ID));
    assert_eq!(get("redirect_uri"), Some("https://app.example.com/auth/wecom/callback"));
    assert_eq!(get("state"), Some("login-1"));
    assert_eq!(get("lang"), Some("en"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redirect_inside_wecom_with_relative_callback() {
    support::init_tracing();
    let server = MockServer::start().await;
    let mut config = config_for(&server).with_trust_proxy(true);
    config.callback_url = Some("/cb".to_string());
    let strategy =
        WeComStrategy::new(config, verifier(), Arc::new(MemoryTokenStore::new())).unwrap();
    let request = AuthRequest::new("/auth/wecom")
        .with_header("Host", "10.0.0.7:3000")
        .with_header("X-Forwarded-Proto", "https")
        .with_header("X-Forwarded-Host", "app.example.com")
        .with_header("User-Agent", "Mozilla/5.0 (iPhone) wxwork/4.1.10 MicroMessenger/7.0.1");

    let outcome = strategy.authenticate(&request, &AuthenticateOptions::default()).await;

    let location = outcome.location().unwrap();
    assert!(location.starts_with("https://open.weixin.qq.com/connect/oauth2/authorize?"));
    assert!(location.ends_with("#wechat_redirect"));
    let query = query_of(location);
    assert!(query.contains(&("redirect_uri".to_string(), "https://app.example.com/cb".to_string())));
    assert!(query.contains(&("agentid".to_string(), AGENT_ID.to_string())));
}

#[tokio::test]
async fn test_full_callback_flow() {
    support::init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user_info(&server, "code-abc", "zhangsan").await;
    mount_user_get(&server, "zhangsan", "Zhang San").await;
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    let outcome = strategy
        .authenticate(
            &AuthRequest::new("/auth/wecom/callback?code=code-abc&state=xyz"),
            &AuthenticateOptions::default(),
        )
        .await;

    let AuthOutcome::Success { user, info } = outcome else { panic!("expected success") };
    assert_eq!(
        user,
        Member {
            id: "zhangsan".to_string(),
            name: Some("Zhang San".to_string()),
            state: Some("xyz".to_string()),
        }
    );
    assert_eq!(info, None);
}

#[tokio::test]
async fn test_service_token_fetched_once_for_many_logins() {
    support::init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    for (code, user) in [("c1", "alice"), ("c2", "bob"), ("c3", "carol")] {
        mount_user_info(&server, code, user).await;
        mount_user_get(&server, user, user).await;
    }
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    for code in ["c1", "c2", "c3"] {
        let request = AuthRequest::new(format!("/cb?code={code}"));
        let outcome = strategy.authenticate(&request, &AuthenticateOptions::default()).await;
        assert!(outcome.is_success(), "login with {code} failed: {outcome:?}");
    }
}

#[tokio::test]
async fn test_file_store_shares_token_between_instances() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("wecom-token.json");
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user_info(&server, "c1", "alice").await;
    mount_user_get(&server, "alice", "Alice").await;

    for _ in 0..2 {
        let store = Arc::new(FileTokenStore::new(&token_path));
        let strategy = WeComStrategy::new(config_for(&server), verifier(), store).unwrap();
        let outcome =
            strategy.authenticate(&AuthRequest::new("/cb?code=c1"), &AuthenticateOptions::default()).await;
        assert!(outcome.is_success());
    }

    let stored = FileTokenStore::new(&token_path).load_token().await.unwrap();
    assert_eq!(stored.access_token, SERVICE_TOKEN);
}

#[tokio::test]
async fn test_blocked_member_fails_with_info() {
    support::init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_user_info(&server, "c1", "blocked").await;
    mount_user_get(&server, "blocked", "Blocked").await;
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    let outcome =
        strategy.authenticate(&AuthRequest::new("/cb?code=c1"), &AuthenticateOptions::default()).await;

    let AuthOutcome::Fail { info } = outcome else { panic!("expected fail") };
    assert_eq!(info, Some(json!({"message": "member is blocked"})));
}

#[tokio::test]
async fn test_invalid_code_is_provider_error() {
    support::init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/getuserinfo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errcode": 40029, "errmsg": "invalid code"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    let outcome =
        strategy.authenticate(&AuthRequest::new("/cb?code=used"), &AuthenticateOptions::default()).await;

    let AuthOutcome::Error(err) = outcome else { panic!("expected error") };
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(err.provider_error().map(|e| e.errcode), Some(40029));
}

#[tokio::test]
async fn test_code_for_non_member_fails() {
    support::init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/getuserinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "OpenId": "o-external",
            "DeviceId": "device-1"
        })))
        .mount(&server)
        .await;
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    let outcome =
        strategy.authenticate(&AuthRequest::new("/cb?code=ext"), &AuthenticateOptions::default()).await;

    assert!(matches!(outcome, AuthOutcome::Fail { info: None }));
}

#[tokio::test]
async fn test_rejected_credentials_surface_before_code_exchange() {
    support::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/gettoken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errcode": 40001, "errmsg": "invalid credential"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/getuserinfo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let strategy =
        WeComStrategy::new(config_for(&server), verifier(), Arc::new(MemoryTokenStore::new()))
            .unwrap();

    let outcome =
        strategy.authenticate(&AuthRequest::new("/cb?code=c1"), &AuthenticateOptions::default()).await;

    assert!(matches!(outcome, AuthOutcome::Error(AuthError::Token(_))));
}
