//! Configuration model and loading
//!
//! [`WeComConfig`] holds everything the strategy needs: corporate
//! credentials, the redirect defaults, and the knobs of the token cache.
//! [`loader`] reads it from the environment or a TOML/JSON file.

pub mod loader;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

pub use loader::{load, load_from_env, load_from_file};

use crate::error::ConfigError;

/// Default WeCom server API base
pub const DEFAULT_API_BASE_URL: &str = "https://qyapi.weixin.qq.com";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_scope_separator() -> String {
    " ".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

/// WeCom adapter configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeComConfig {
    /// Corporation id (`corpid`), also the `appid` of authorization URLs
    pub corp_id: String,

    /// Application secret (`corpsecret`) used to obtain service tokens
    pub corp_secret: String,

    /// Application id (`agentid`)
    pub agent_id: String,

    /// Callback URL; a path such as `/auth/callback` is resolved against the
    /// originating request
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Default requested scopes
    #[serde(default)]
    pub scope: Vec<String>,

    /// Separator used to join `scope`
    #[serde(default = "default_scope_separator")]
    pub scope_separator: String,

    /// Default opaque state
    #[serde(default)]
    pub state: Option<String>,

    /// Hand the inbound request to the verifier alongside the profile
    #[serde(default)]
    pub pass_request_to_verifier: bool,

    /// Use the embedded web login component instead of QR login outside the
    /// WeCom browser
    #[serde(default)]
    pub web_login_component: bool,

    /// Honour `X-Forwarded-Proto`/`X-Forwarded-Host` when resolving relative
    /// callback URLs
    #[serde(default)]
    pub trust_proxy: bool,

    /// Additional provider fields appended to every authorization URL. Their
    /// keys may also be overridden from the inbound query string.
    #[serde(default)]
    pub authorize_params: BTreeMap<String, String>,

    /// WeCom server API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for each outbound provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Treat tokens as expired this many seconds early
    #[serde(default)]
    pub expiry_margin_seconds: i64,
}

impl WeComConfig {
    /// Create a configuration with the three required credentials and
    /// defaults for everything else
    #[must_use]
    pub fn new(
        corp_id: impl Into<String>,
        corp_secret: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            agent_id: agent_id.into(),
            callback_url: None,
            scope: Vec::new(),
            scope_separator: default_scope_separator(),
            state: None,
            pass_request_to_verifier: false,
            web_login_component: false,
            trust_proxy: false,
            authorize_params: BTreeMap::new(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            expiry_margin_seconds: 0,
        }
    }

    /// Set the callback URL
    #[must_use]
    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    /// Set the default scopes
    #[must_use]
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default state
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Point provider calls at a different API base
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Add an extra authorization parameter
    #[must_use]
    pub fn with_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.authorize_params.insert(key.into(), value.into());
        self
    }

    /// Use the web login component for non-WeCom browsers
    #[must_use]
    pub const fn with_web_login_component(mut self, enabled: bool) -> Self {
        self.web_login_component = enabled;
        self
    }

    /// Pass the inbound request to the verifier
    #[must_use]
    pub const fn with_pass_request_to_verifier(mut self, enabled: bool) -> Self {
        self.pass_request_to_verifier = enabled;
        self
    }

    /// Trust proxy forwarding headers
    #[must_use]
    pub const fn with_trust_proxy(mut self, enabled: bool) -> Self {
        self.trust_proxy = enabled;
        self
    }

    /// Configured scopes joined with the separator, or `None` when empty
    #[must_use]
    pub fn scope_string(&self) -> Option<String> {
        if self.scope.is_empty() {
            None
        } else {
            Some(self.scope.join(&self.scope_separator))
        }
    }

    /// Reject incomplete or malformed configuration
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] for a blank credential and
    /// [`ConfigError::Invalid`] for an unusable API base, timeout or margin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("corp_id", &self.corp_id)?;
        require("corp_secret", &self.corp_secret)?;
        require("agent_id", &self.agent_id)?;

        let base = Url::parse(&self.api_base_url).map_err(|e| ConfigError::Invalid {
            field: "api_base_url",
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "api_base_url",
                reason: format!("unsupported scheme {}", base.scheme()),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.expiry_margin_seconds < 0 {
            return Err(ConfigError::Invalid {
                field: "expiry_margin_seconds",
                reason: "must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(field))
    } else {
        Ok(())
    }
}

impl fmt::Debug for WeComConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeComConfig")
            .field("corp_id", &self.corp_id)
            .field("corp_secret", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("callback_url", &self.callback_url)
            .field("scope", &self.scope)
            .field("state", &self.state)
            .field("pass_request_to_verifier", &self.pass_request_to_verifier)
            .field("web_login_component", &self.web_login_component)
            .field("trust_proxy", &self.trust_proxy)
            .field("authorize_params", &self.authorize_params)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}
