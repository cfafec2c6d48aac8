//! Shared helpers for integration tests

use std::sync::Once;

use async_trait::async_trait;
use serde_json::json;
use wecom_auth::auth::Verification;
use wecom_auth::error::VerifyError;
use wecom_auth::{AuthRequest, UserProfile, Verifier, WeComConfig};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CORP_ID: &str = "ww0123456789abcdef";
pub const CORP_SECRET: &str = "corp-secret";
pub const AGENT_ID: &str = "1000002";
pub const SERVICE_TOKEN: &str = "service-access-token";

static TRACING: Once = Once::new();

/// Route library logs to the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("wecom_auth=debug"))
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Configuration pointing at `server`
pub fn config_for(server: &MockServer) -> WeComConfig {
    WeComConfig::new(CORP_ID, CORP_SECRET, AGENT_ID)
        .with_api_base_url(server.uri())
        .with_callback_url("https://app.example.com/auth/wecom/callback")
}

/// Answer `gettoken` for the test corporation, exactly `times` times
pub async fn mount_token(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/gettoken"))
        .and(query_param("corpid", CORP_ID))
        .and(query_param("corpsecret", CORP_SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "access_token": SERVICE_TOKEN,
            "expires_in": 7200
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Resolve `code` to member `user_id`
pub async fn mount_user_info(server: &MockServer, code: &str, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/getuserinfo"))
        .and(query_param("access_token", SERVICE_TOKEN))
        .and(query_param("code", code))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "UserId": user_id,
            "DeviceId": "device-1"
        })))
        .mount(server)
        .await;
}

/// Serve the profile of member `user_id`
pub async fn mount_user_get(server: &MockServer, user_id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .and(query_param("access_token", SERVICE_TOKEN))
        .and(query_param("userid", user_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "userid": user_id,
            "name": name,
            "department": [1],
            "position": "engineer",
            "gender": "1",
            "email": format!("{user_id}@example.com"),
            "status": 1,
            "enable": 1
        })))
        .mount(server)
        .await;
}

/// Application user produced by [`DirectoryVerifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub name: Option<String>,
    pub state: Option<String>,
}

/// Accepts every member except the ones listed as blocked
pub struct DirectoryVerifier {
    pub blocked: Vec<String>,
}

#[async_trait]
impl Verifier for DirectoryVerifier {
    type User = Member;

    async fn verify(
        &self,
        _request: Option<&AuthRequest>,
        profile: UserProfile,
    ) -> Result<Verification<Member>, VerifyError> {
        let Some(id) = profile.id else {
            return Ok(Verification::fail(None));
        };

        if self.blocked.contains(&id) {
            return Ok(Verification::fail(Some(json!({"message": "member is blocked"}))));
        }

        Ok(Verification::success(Member { id, name: profile.name, state: profile.state }))
    }
}
