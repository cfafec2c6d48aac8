//! Error types used throughout the adapter
//!
//! Errors are layered the same way the calls are:
//!
//! | Layer | Type | Raised by |
//! |-------|------|-----------|
//! | Provider call | [`ApiError`] | `WeComClient` (transport, parse, provider payload) |
//! | Token cache | [`StoreError`] | `TokenStore` implementations |
//! | Token lifecycle | [`TokenError`] | `TokenManager` |
//! | Configuration | [`ConfigError`] | config validation and loading |
//! | Request handling | [`AuthError`] | `WeComStrategy`, carried by the Error outcome |
//!
//! [`AuthError::kind`] flattens the nesting into an [`ErrorKind`] so a host
//! can tell a provider rejection apart from a network failure.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Boxed error returned by application verification logic.
pub type VerifyError = Box<dyn std::error::Error + Send + Sync>;

/// Error payload reported by WeCom inside an otherwise successful response.
///
/// WeCom answers most failures with HTTP 200 and a body such as
/// `{"errcode": 40029, "errmsg": "invalid code"}`. The full payload is kept
/// so callers can inspect fields beyond `errcode`/`errmsg`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    /// Provider error code (never zero)
    pub errcode: i64,
    /// Provider error message
    pub errmsg: String,
    /// Entire response payload as received
    pub payload: Value,
}

impl ProviderError {
    /// `errcode` reported when the provider's code is not an integer
    pub const NON_NUMERIC_ERRCODE: i64 = i64::MIN;

    /// Inspect a parsed payload and return the provider error it carries, if
    /// any.
    ///
    /// A payload is an error when `errcode` is present and is neither zero
    /// (`0`, `"0"`), empty, `false` nor `null`. A code that is not an
    /// integer is reported as [`Self::NON_NUMERIC_ERRCODE`].
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let errcode = match payload.get("errcode")? {
            Value::Null | Value::Bool(false) => return None,
            Value::Number(n) => match n.as_i64() {
                Some(0) => return None,
                Some(code) => code,
                None if n.as_f64() == Some(0.0) => return None,
                None => Self::NON_NUMERIC_ERRCODE,
            },
            Value::String(s) => match s.trim() {
                "" => return None,
                code => match code.parse::<i64>() {
                    Ok(0) => return None,
                    Ok(code) => code,
                    Err(_) => Self::NON_NUMERIC_ERRCODE,
                },
            },
            Value::Bool(true) | Value::Array(_) | Value::Object(_) => Self::NON_NUMERIC_ERRCODE,
        };

        let errmsg =
            payload.get("errmsg").and_then(Value::as_str).unwrap_or_default().to_string();

        Some(Self { errcode, errmsg, payload: payload.clone() })
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errmsg.is_empty() {
            write!(f, "errcode {}", self.errcode)
        } else {
            write!(f, "errcode {}: {}", self.errcode, self.errmsg)
        }
    }
}

impl std::error::Error for ProviderError {}

/// Failure of a single outbound provider call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP call itself failed (connection, DNS, timeout, non-2xx)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON document
    #[error("Failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response parsed but carried a provider error code
    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

/// Token store adapter failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// No token has been persisted yet
    #[error("No access token stored")]
    NotFound,

    /// Backing file could not be read or written
    #[error("Token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored token could not be encoded or decoded
    #[error("Token store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend-specific failure
    #[error("Token store backend error: {0}")]
    Backend(String),
}

/// Token lifecycle manager failure
#[derive(Debug, Error)]
pub enum TokenError {
    /// Fetching a fresh service token from the provider failed
    #[error("Failed to acquire access token: {0}")]
    Acquire(#[from] ApiError),

    /// The fresh token could not be persisted
    #[error("Failed to persist access token: {0}")]
    Persist(#[source] StoreError),
}

/// Configuration failure, raised before any request is handled
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or blank
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file content could not be parsed
    #[error("Invalid config format: {0}")]
    Format(String),
}

/// Coarse classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network-level failure talking to the provider
    Transport,
    /// Provider response was not valid JSON of the expected shape
    Parse,
    /// Provider returned an error payload
    Provider,
    /// Token store could not persist a fresh token
    Storage,
    /// The inbound request could not be interpreted
    Request,
    /// Application verification logic failed
    Verification,
}

/// Error outcome of a single authentication attempt
#[derive(Debug, Error)]
pub enum AuthError {
    /// Service token could not be obtained
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Subject resolution or profile fetch failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The inbound request lacks what is needed to build a redirect
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No callback URL is configured, passed per request, or in the query
    #[error("No callback URL configured for redirect")]
    MissingCallbackUrl,

    /// The verifier reported an error
    #[error("Verification failed: {0}")]
    Verification(#[source] VerifyError),

    /// The verifier panicked
    #[error("Verifier panicked: {0}")]
    VerifierPanicked(String),
}

impl AuthError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Token(TokenError::Acquire(api)) | Self::Api(api) => api.kind(),
            Self::Token(TokenError::Persist(_)) => ErrorKind::Storage,
            Self::InvalidRequest(_) | Self::MissingCallbackUrl => ErrorKind::Request,
            Self::Verification(_) | Self::VerifierPanicked(_) => ErrorKind::Verification,
        }
    }

    /// Provider error payload, if this error carries one
    #[must_use]
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Token(TokenError::Acquire(ApiError::Provider(e)))
            | Self::Api(ApiError::Provider(e)) => Some(e),
            _ => None,
        }
    }
}

impl ApiError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Provider(_) => ErrorKind::Provider,
        }
    }
}
