//! Integration tests for the WeCom API client
//!
//! **Coverage:**
//! - Successful token, code exchange and profile calls
//! - Provider errors delivered with HTTP 200
//! - Malformed bodies, HTTP failures and unreachable hosts
//!
//! **Infrastructure:** WireMock server standing in for `qyapi.weixin.qq.com`

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use serde_json::json;
use support::{config_for, mount_token, mount_user_get, mount_user_info, CORP_ID, CORP_SECRET};
use wecom_auth::{ErrorKind, WeComApi, WeComClient, WeComConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_service_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let client = WeComClient::new(&config_for(&server)).unwrap();

    let token = client.fetch_service_token(CORP_ID, CORP_SECRET).await.unwrap();

    assert_eq!(token.access_token, support::SERVICE_TOKEN);
    assert_eq!(token.expires_in, 7200);
}

#[tokio::test]
async fn test_code_exchange_and_profile() {
    let server = MockServer::start().await;
    mount_user_info(&server, "code-1", "lisi").await;
    mount_user_get(&server, "lisi", "Li Si").await;
    let client = WeComClient::new(&config_for(&server)).unwrap();

    let identity = client.resolve_subject_id(support::SERVICE_TOKEN, "code-1").await.unwrap();
    assert_eq!(identity.subject_id(), Some("lisi"));
    assert_eq!(identity.device_id.as_deref(), Some("device-1"));

    let profile = client.fetch_profile(support::SERVICE_TOKEN, "lisi").await.unwrap();
    assert_eq!(profile.userid.as_deref(), Some("lisi"));
    assert_eq!(profile.name.as_deref(), Some("Li Si"));
    assert_eq!(profile.department, vec![1]);
    assert_eq!(profile.extra.get("enable"), Some(&json!(1)));
    assert!(!profile.extra.contains_key("errcode"));
}

#[tokio::test]
async fn test_provider_error_with_http_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/gettoken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 40001, "errmsg": "invalid credential"})),
        )
        .mount(&server)
        .await;
    let client = WeComClient::new(&config_for(&server)).unwrap();

    let err = client.fetch_service_token(CORP_ID, "wrong").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Provider);
    let wecom_auth::ApiError::Provider(provider) = err else { panic!("expected provider error") };
    assert_eq!(provider.errcode, 40001);
    assert_eq!(provider.errmsg, "invalid credential");
    assert_eq!(provider.payload["errcode"], 40001);
}

#[tokio::test]
async fn test_non_json_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/getuserinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;
    let client = WeComClient::new(&config_for(&server)).unwrap();

    let err = client.resolve_subject_id("token", "code").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_http_failure_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let client = WeComClient::new(&config_for(&server)).unwrap();

    let err = client.fetch_profile("token", "lisi").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let config = WeComConfig::new(CORP_ID, CORP_SECRET, "1")
        .with_api_base_url(format!("http://{address}"));
    let client = WeComClient::new(&config).unwrap();

    let err = client.fetch_service_token(CORP_ID, CORP_SECRET).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}
