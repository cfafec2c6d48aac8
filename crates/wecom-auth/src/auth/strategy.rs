//! WeCom authentication strategy
//!
//! One [`WeComStrategy::authenticate`] call handles one inbound request and
//! ends in exactly one [`AuthOutcome`]:
//!
//! ```text
//! request ──► code present? ──no──► build params ──► pick entry mode ──► Redirect
//!                  │
//!                 yes
//!                  ▼
//!        service token ──► code → UserId ──► user/get ──► verifier
//!                                                          │
//!                                        Success / Fail / Error
//! ```
//!
//! Every failure of the provider chain ends as [`AuthOutcome::Error`]; a
//! code that resolves to no member ends as [`AuthOutcome::Fail`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::authorize::AuthorizeUrlBuilder;
use super::client::WeComClient;
use super::request::{AuthRequest, RequestKind};
use super::token_manager::TokenManager;
use super::traits::{TokenStore, WeComApi};
use super::types::{AuthorizeParams, EntryMode, UserProfile};
use crate::config::WeComConfig;
use crate::error::{AuthError, ConfigError, VerifyError};
use crate::time::Clock;

/// Query key that overrides the callback URL after every other source
pub const CALLBACK_URL_QUERY_KEY: &str = "callbackURL";

/// HTTP status used for authorization redirects
pub const REDIRECT_STATUS: u16 = 302;

/// Result of application verification
#[derive(Debug, Clone, PartialEq)]
pub struct Verification<U> {
    /// Authenticated user; `None` rejects the login
    pub user: Option<U>,
    /// Optional details passed through to the outcome
    pub info: Option<Value>,
}

impl<U> Verification<U> {
    /// Accept the login as `user`
    pub fn success(user: U) -> Self {
        Self { user: Some(user), info: None }
    }

    /// Reject the login
    pub fn fail(info: Option<Value>) -> Self {
        Self { user: None, info }
    }

    /// Attach details to the outcome
    #[must_use]
    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }
}

/// Application-supplied verification logic
///
/// Receives the resolved member profile and decides who, if anyone, is
/// logged in. The request is only passed when
/// [`WeComConfig::pass_request_to_verifier`] is set.
///
/// A panic inside `verify` becomes [`AuthError::VerifierPanicked`] only when
/// panics unwind. Under `panic = "abort"` (this workspace's release
/// profile) a panicking verifier aborts the process.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Application user type
    type User: Send;

    /// Map a member profile to an application user
    ///
    /// # Errors
    /// An error ends the attempt as [`AuthOutcome::Error`].
    async fn verify(
        &self,
        request: Option<&AuthRequest>,
        profile: UserProfile,
    ) -> Result<Verification<Self::User>, VerifyError>;
}

/// Terminal outcome of one authentication attempt
#[derive(Debug)]
pub enum AuthOutcome<U> {
    /// Send the user agent to `location`
    Redirect {
        /// Authorization URL
        location: String,
        /// HTTP status, always 302
        status: u16,
    },
    /// Verifier accepted the login
    Success {
        /// Authenticated user
        user: U,
        /// Verifier details
        info: Option<Value>,
    },
    /// Login rejected without an error
    Fail {
        /// Verifier details
        info: Option<Value>,
    },
    /// Provider, request or verifier failure
    Error(AuthError),
}

impl<U> AuthOutcome<U> {
    /// Whether this is a redirect
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// Whether the login succeeded
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Redirect target, if this is a redirect
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Error, if this is an error
    pub const fn error(&self) -> Option<&AuthError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-call overrides supplied by the host application
#[derive(Debug, Clone, Default)]
pub struct AuthenticateOptions {
    /// Callback URL; takes precedence over the configured one
    pub callback_url: Option<String>,
    /// Scope for this redirect
    pub scope: Option<String>,
    /// State for this redirect
    pub state: Option<String>,
}

impl AuthenticateOptions {
    /// Options with only a callback URL
    #[must_use]
    pub fn with_callback_url(callback_url: impl Into<String>) -> Self {
        Self { callback_url: Some(callback_url.into()), ..Self::default() }
    }
}

/// WeCom login strategy
///
/// Stateless between calls apart from the shared token store; safe to share
/// across concurrent requests.
pub struct WeComStrategy<V: Verifier, A: WeComApi + ?Sized = WeComClient> {
    config: WeComConfig,
    urls: AuthorizeUrlBuilder,
    api: Arc<A>,
    tokens: TokenManager<A>,
    verifier: V,
}

impl<V: Verifier> WeComStrategy<V, WeComClient> {
    /// Create a strategy that talks to WeCom over HTTP
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(
        config: WeComConfig,
        verifier: V,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let api = Arc::new(WeComClient::new(&config)?);
        Self::with_api(config, verifier, store, api)
    }
}

impl<V: Verifier, A: WeComApi + ?Sized> WeComStrategy<V, A> {
    /// Registered strategy name
    pub const NAME: &'static str = "workWechat";

    /// Create a strategy around an existing provider API
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn with_api(
        config: WeComConfig,
        verifier: V,
        store: Arc<dyn TokenStore>,
        api: Arc<A>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let tokens = TokenManager::new(
            Arc::clone(&api),
            store,
            config.corp_id.clone(),
            config.corp_secret.clone(),
        )
        .with_expiry_margin(config.expiry_margin_seconds);
        let urls = AuthorizeUrlBuilder::new(config.corp_id.clone(), config.agent_id.clone());

        Ok(Self { config, urls, api, tokens, verifier })
    }

    /// Judge token expiry against `clock`
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tokens = self.tokens.with_clock(clock);
        self
    }

    /// Strategy configuration
    pub const fn config(&self) -> &WeComConfig {
        &self.config
    }

    /// Service token manager
    pub const fn token_manager(&self) -> &TokenManager<A> {
        &self.tokens
    }

    /// Handle one inbound request
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> AuthOutcome<V::User> {
        match request.kind() {
            RequestKind::Callback { code, state } => {
                self.complete_callback(request, code, state).await
            }
            RequestKind::Redirect => self.redirect(request, options),
        }
    }

    /// Entry mode for a request without a code
    pub fn select_entry_mode(&self, request: &AuthRequest) -> EntryMode {
        if request.is_wecom_browser() {
            EntryMode::Browser
        } else if self.config.web_login_component {
            EntryMode::Component
        } else {
            EntryMode::Qr
        }
    }

    /// Authorization parameters for one redirect
    ///
    /// Precedence, lowest first: configuration, `options`, query overrides,
    /// then the `callbackURL` query key for the callback URL.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingCallbackUrl`] if no source yields a
    /// callback URL, or [`AuthError::InvalidRequest`] if a relative one
    /// cannot be resolved against the request.
    pub fn authorize_params(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> Result<AuthorizeParams, AuthError> {
        let callback = options.callback_url.as_deref().or(self.config.callback_url.as_deref());

        let mut params = AuthorizeParams {
            redirect_uri: callback.unwrap_or_default().to_string(),
            scope: options.scope.clone().or_else(|| self.config.scope_string()),
            state: options.state.clone().or_else(|| self.config.state.clone()),
            extra: self.config.authorize_params.clone(),
        };

        params.apply_overrides(request.query_pairs());

        if let Some(cb) = request.query_param(CALLBACK_URL_QUERY_KEY).filter(|cb| !cb.is_empty()) {
            cb.clone_into(&mut params.redirect_uri);
        }

        if params.redirect_uri.is_empty() {
            return Err(AuthError::MissingCallbackUrl);
        }

        // Relative callbacks resolve against the request
        params.redirect_uri = self.resolve_callback_url(request, &params.redirect_uri)?;

        Ok(params)
    }

    /// Absolute callback URLs pass through; relative ones resolve against
    /// the URL the client requested
    fn resolve_callback_url(
        &self,
        request: &AuthRequest,
        callback: &str,
    ) -> Result<String, AuthError> {
        match Url::parse(callback) {
            Ok(_) => Ok(callback.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = request.original_url(self.config.trust_proxy)?;
                let resolved = base.join(callback).map_err(|e| {
                    AuthError::InvalidRequest(format!("cannot resolve callback URL: {e}"))
                })?;
                Ok(resolved.into())
            }
            Err(e) => Err(AuthError::InvalidRequest(format!("invalid callback URL: {e}"))),
        }
    }

    fn redirect(&self, request: &AuthRequest, options: &AuthenticateOptions) -> AuthOutcome<V::User> {
        let params = match self.authorize_params(request, options) {
            Ok(params) => params,
            Err(e) => {
                warn!(strategy = Self::NAME, error = %e, "cannot build authorization redirect");
                return AuthOutcome::Error(e);
            }
        };

        let mode = self.select_entry_mode(request);
        let location = self.urls.build(mode, &params);
        debug!(strategy = Self::NAME, %mode, "redirecting to WeCom authorization");

        AuthOutcome::Redirect { location, status: REDIRECT_STATUS }
    }

    async fn complete_callback(
        &self,
        request: &AuthRequest,
        code: &str,
        state: Option<&str>,
    ) -> AuthOutcome<V::User> {
        debug!(strategy = Self::NAME, "handling WeCom callback");

        let profile = match self.resolve_profile(code, state).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(strategy = Self::NAME, "authorization code resolved to no member");
                return AuthOutcome::Fail { info: None };
            }
            Err(e) => {
                warn!(strategy = Self::NAME, kind = ?e.kind(), error = %e, "WeCom callback failed");
                return AuthOutcome::Error(e);
            }
        };

        self.run_verifier(request, profile).await
    }

    /// Resolve `code` to a member profile
    ///
    /// `Ok(None)` means WeCom accepted the code but named no member.
    async fn resolve_profile(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<Option<UserProfile>, AuthError> {
        let token = self.tokens.get_access_token().await?;

        let identity = self.api.resolve_subject_id(&token.access_token, code).await?;
        let Some(user_id) = identity.subject_id() else {
            return Ok(None);
        };

        let mut profile = self.api.fetch_profile(&token.access_token, user_id).await?;
        profile.id = profile.userid.clone().filter(|id| !id.is_empty());
        profile.state = state.map(str::to_string);

        Ok(profile.id.is_some().then_some(profile))
    }

    async fn run_verifier(&self, request: &AuthRequest, profile: UserProfile) -> AuthOutcome<V::User> {
        let request = self.config.pass_request_to_verifier.then_some(request);
        let user_id = profile.id.clone();

        let result = AssertUnwindSafe(self.verifier.verify(request, profile)).catch_unwind().await;

        match result {
            Ok(Ok(Verification { user: Some(user), info })) => {
                info!(strategy = Self::NAME, user_id = ?user_id, "WeCom login verified");
                AuthOutcome::Success { user, info }
            }
            Ok(Ok(Verification { user: None, info })) => {
                info!(strategy = Self::NAME, user_id = ?user_id, "verifier rejected WeCom login");
                AuthOutcome::Fail { info }
            }
            Ok(Err(e)) => {
                warn!(strategy = Self::NAME, error = %e, "verifier returned an error");
                AuthOutcome::Error(AuthError::Verification(e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(strategy = Self::NAME, %message, "verifier panicked");
                AuthOutcome::Error(AuthError::VerifierPanicked(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
