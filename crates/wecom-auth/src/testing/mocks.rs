//! Mock implementations of the strategy's collaborators
//!
//! Every mock is cheap to clone; clones share state so a test can hand one
//! copy to the strategy and inspect another.

// Mocks are simple by design; failure is visible in the return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::auth::{
    AccessToken, AuthRequest, ServiceToken, SubjectIdentity, TokenStore, UserProfile,
    Verification, Verifier, WeComApi,
};
use crate::error::{ApiError, ProviderError, StoreError, VerifyError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Failure a mock call should produce
#[derive(Debug, Clone)]
enum Failure {
    Provider { errcode: i64, errmsg: String },
    Parse,
}

impl Failure {
    fn provider(errcode: i64, errmsg: &str) -> Self {
        Self::Provider { errcode, errmsg: errmsg.to_string() }
    }

    fn to_error(&self) -> ApiError {
        match self {
            Self::Provider { errcode, errmsg } => {
                let payload = json!({"errcode": errcode, "errmsg": errmsg});
                ApiError::Provider(ProviderError {
                    errcode: *errcode,
                    errmsg: errmsg.clone(),
                    payload,
                })
            }
            Self::Parse => ApiError::Parse(<serde_json::Error as serde::de::Error>::custom(
                "response body is not JSON",
            )),
        }
    }
}

#[derive(Debug)]
struct ApiState {
    service_token: Mutex<ServiceToken>,
    token_failure: Mutex<Option<Failure>>,
    identity: Mutex<SubjectIdentity>,
    resolve_failure: Mutex<Option<Failure>>,
    profile: Mutex<Value>,
    profile_failure: Mutex<Option<Failure>>,
    resolved_codes: Mutex<Vec<String>>,
    last_access_token: Mutex<Option<String>>,
    token_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

/// Mock WeCom API that answers from memory
///
/// Defaults: `gettoken` returns `"service-token"` valid for 7200 seconds,
/// every code resolves to member `zhangsan`, and `user/get` returns a
/// profile for that member.
#[derive(Debug, Clone)]
pub struct MockWeComApi {
    state: Arc<ApiState>,
}

impl MockWeComApi {
    /// Create a mock with the default responses
    pub fn new() -> Self {
        Self {
            state: Arc::new(ApiState {
                service_token: Mutex::new(ServiceToken {
                    access_token: "service-token".to_string(),
                    expires_in: 7200,
                }),
                token_failure: Mutex::new(None),
                identity: Mutex::new(SubjectIdentity {
                    user_id: Some("zhangsan".to_string()),
                    ..SubjectIdentity::default()
                }),
                resolve_failure: Mutex::new(None),
                profile: Mutex::new(json!({
                    "errcode": 0,
                    "errmsg": "ok",
                    "userid": "zhangsan",
                    "name": "Zhang San",
                    "department": [1, 2],
                    "position": "engineer",
                    "status": 1
                })),
                profile_failure: Mutex::new(None),
                resolved_codes: Mutex::new(Vec::new()),
                last_access_token: Mutex::new(None),
                token_calls: AtomicUsize::new(0),
                resolve_calls: AtomicUsize::new(0),
                profile_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Configure the token returned by `fetch_service_token`
    pub fn set_service_token(&self, access_token: &str, expires_in: i64) {
        *lock(&self.state.service_token) =
            ServiceToken { access_token: access_token.to_string(), expires_in };
    }

    /// Make `fetch_service_token` return a provider error
    pub fn fail_token_with_errcode(&self, errcode: i64, errmsg: &str) {
        *lock(&self.state.token_failure) = Some(Failure::provider(errcode, errmsg));
    }

    /// Make `fetch_service_token` return a parse error
    pub fn fail_token_with_parse_error(&self) {
        *lock(&self.state.token_failure) = Some(Failure::Parse);
    }

    /// Member id every code resolves to; `None` resolves to nobody
    pub fn set_user_id(&self, user_id: Option<&str>) {
        lock(&self.state.identity).user_id = user_id.map(str::to_string);
    }

    /// Make `resolve_subject_id` return a provider error
    pub fn fail_resolve_with_errcode(&self, errcode: i64, errmsg: &str) {
        *lock(&self.state.resolve_failure) = Some(Failure::provider(errcode, errmsg));
    }

    /// Raw `user/get` payload
    pub fn set_profile(&self, payload: Value) {
        *lock(&self.state.profile) = payload;
    }

    /// Make `fetch_profile` return a provider error
    pub fn fail_profile_with_errcode(&self, errcode: i64, errmsg: &str) {
        *lock(&self.state.profile_failure) = Some(Failure::provider(errcode, errmsg));
    }

    /// Number of `fetch_service_token` calls
    #[must_use]
    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    /// Number of `resolve_subject_id` calls
    #[must_use]
    pub fn resolve_calls(&self) -> usize {
        self.state.resolve_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_profile` calls
    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.state.profile_calls.load(Ordering::SeqCst)
    }

    /// Codes passed to `resolve_subject_id`, in order
    #[must_use]
    pub fn resolved_codes(&self) -> Vec<String> {
        lock(&self.state.resolved_codes).clone()
    }

    /// Access token used by the most recent code exchange
    #[must_use]
    pub fn last_access_token(&self) -> Option<String> {
        lock(&self.state.last_access_token).clone()
    }
}

impl Default for MockWeComApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeComApi for MockWeComApi {
    async fn fetch_service_token(
        &self,
        _corp_id: &str,
        _corp_secret: &str,
    ) -> Result<ServiceToken, ApiError> {
        self.state.token_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = lock(&self.state.token_failure).as_ref() {
            return Err(failure.to_error());
        }
        Ok(lock(&self.state.service_token).clone())
    }

    async fn resolve_subject_id(
        &self,
        access_token: &str,
        code: &str,
    ) -> Result<SubjectIdentity, ApiError> {
        self.state.resolve_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.resolved_codes).push(code.to_string());
        *lock(&self.state.last_access_token) = Some(access_token.to_string());

        if let Some(failure) = lock(&self.state.resolve_failure).as_ref() {
            return Err(failure.to_error());
        }
        Ok(lock(&self.state.identity).clone())
    }

    async fn fetch_profile(
        &self,
        _access_token: &str,
        _user_id: &str,
    ) -> Result<UserProfile, ApiError> {
        self.state.profile_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = lock(&self.state.profile_failure).as_ref() {
            return Err(failure.to_error());
        }
        let payload = lock(&self.state.profile).clone();
        Ok(UserProfile::from_payload(payload)?)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    token: Mutex<Option<AccessToken>>,
    load_failure: Mutex<Option<String>>,
    save_failure: Mutex<Option<String>>,
    load_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

/// Mock token store with injectable failures
///
/// Injected failures surface as [`StoreError::Backend`].
#[derive(Debug, Clone, Default)]
pub struct MockTokenStore {
    state: Arc<StoreState>,
}

impl MockTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every load fail with `message`
    pub fn fail_loads(&self, message: &str) {
        *lock(&self.state.load_failure) = Some(message.to_string());
    }

    /// Make every save fail with `message`
    pub fn fail_saves(&self, message: &str) {
        *lock(&self.state.save_failure) = Some(message.to_string());
    }

    /// Currently stored token
    #[must_use]
    pub fn stored_token(&self) -> Option<AccessToken> {
        lock(&self.state.token).clone()
    }

    /// Number of `load_token` calls
    #[must_use]
    pub fn load_calls(&self) -> usize {
        self.state.load_calls.load(Ordering::SeqCst)
    }

    /// Number of `save_token` calls
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.state.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn load_token(&self) -> Result<AccessToken, StoreError> {
        self.state.load_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.state.load_failure).as_ref() {
            return Err(StoreError::Backend(message.clone()));
        }
        lock(&self.state.token).clone().ok_or(StoreError::NotFound)
    }

    async fn save_token(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.state.save_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.state.save_failure).as_ref() {
            return Err(StoreError::Backend(message.clone()));
        }
        *lock(&self.state.token) = Some(token.clone());
        Ok(())
    }
}

/// How a [`RecordingVerifier`] answers
#[derive(Debug, Clone)]
pub enum VerifierResponse {
    /// Accept as the profile's member id
    Accept,
    /// Reject with the given info
    Reject(Option<Value>),
    /// Return an error with the given message
    Error(String),
    /// Panic with the given message
    Panic(String),
}

#[derive(Debug, Default)]
struct VerifierState {
    profiles: Mutex<Vec<UserProfile>>,
    requests_seen: Mutex<Vec<bool>>,
}

/// Verifier that records what it is given
#[derive(Debug, Clone)]
pub struct RecordingVerifier {
    response: VerifierResponse,
    state: Arc<VerifierState>,
}

impl RecordingVerifier {
    /// Verifier answering with `response`
    pub fn new(response: VerifierResponse) -> Self {
        Self { response, state: Arc::default() }
    }

    /// Accept every profile as its member id
    pub fn accepting() -> Self {
        Self::new(VerifierResponse::Accept)
    }

    /// Reject every profile
    pub fn rejecting(info: Option<Value>) -> Self {
        Self::new(VerifierResponse::Reject(info))
    }

    /// Fail every verification with `message`
    pub fn failing(message: &str) -> Self {
        Self::new(VerifierResponse::Error(message.to_string()))
    }

    /// Panic on every verification
    pub fn panicking(message: &str) -> Self {
        Self::new(VerifierResponse::Panic(message.to_string()))
    }

    /// Number of verifications
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.state.profiles).len()
    }

    /// Profiles received, in order
    #[must_use]
    pub fn profiles(&self) -> Vec<UserProfile> {
        lock(&self.state.profiles).clone()
    }

    /// Whether each verification received the request
    #[must_use]
    pub fn requests_seen(&self) -> Vec<bool> {
        lock(&self.state.requests_seen).clone()
    }
}

#[async_trait]
impl Verifier for RecordingVerifier {
    type User = String;

    async fn verify(
        &self,
        request: Option<&AuthRequest>,
        profile: UserProfile,
    ) -> Result<Verification<String>, VerifyError> {
        lock(&self.state.requests_seen).push(request.is_some());
        let user = profile.id.clone().unwrap_or_default();
        lock(&self.state.profiles).push(profile);

        match &self.response {
            VerifierResponse::Accept => Ok(Verification::success(user)),
            VerifierResponse::Reject(info) => Ok(Verification::fail(info.clone())),
            VerifierResponse::Error(message) => Err(message.clone().into()),
            VerifierResponse::Panic(message) => panic!("{message}"),
        }
    }
}
