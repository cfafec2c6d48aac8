//! WeCom OAuth types
//!
//! Token, identity and profile records exchanged with WeCom, and the
//! per-request authorization parameters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Service access token with its acquisition time
///
/// Immutable once built; a refresh produces a new value that replaces the
/// stored one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque bearer token
    pub access_token: String,

    /// Provider-declared lifetime in seconds
    pub expires_in: i64,

    /// When the token was acquired
    pub issued_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token acquired at `issued_at`
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: i64, issued_at: DateTime<Utc>) -> Self {
        Self { access_token: access_token.into(), expires_in, issued_at }
    }

    /// Absolute expiry time
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + chrono::Duration::seconds(self.expires_in)
    }

    /// Whether the token has expired by the wall clock
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token has expired at `now`
    ///
    /// Expired once `now - issued_at >= expires_in`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_within(0, now)
    }

    /// Whether the token expires within `margin_seconds` of `now`
    #[must_use]
    pub fn is_expired_within(&self, margin_seconds: i64, now: DateTime<Utc>) -> bool {
        (now - self.issued_at).num_seconds() + margin_seconds >= self.expires_in
    }

    /// Seconds left until expiry at `now` (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// `gettoken` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceToken {
    /// Bearer token
    pub access_token: String,
    /// Lifetime in seconds (7200 for WeCom)
    pub expires_in: i64,
}

/// `getuserinfo` response: the identity behind an authorization code
///
/// Members of the corporation carry a `UserId`; outside users only get an
/// `OpenId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubjectIdentity {
    /// Member id inside the corporation
    #[serde(rename = "UserId", alias = "userid")]
    pub user_id: Option<String>,

    /// Id of a non-member
    #[serde(rename = "OpenId", alias = "openid")]
    pub open_id: Option<String>,

    /// Device the user authenticated from
    #[serde(rename = "DeviceId", alias = "deviceid")]
    pub device_id: Option<String>,

    /// Ticket for fetching sensitive member fields
    pub user_ticket: Option<String>,
}

impl SubjectIdentity {
    /// Member id, if one was resolved
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Member profile as returned by `user/get`
///
/// Well-known fields are typed; everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject id, copied from `userid` by the strategy
    #[serde(default, skip_deserializing)]
    pub id: Option<String>,

    /// State echoed back on the callback
    #[serde(default, skip_deserializing)]
    pub state: Option<String>,

    /// Member id
    #[serde(default)]
    pub userid: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Mobile number
    #[serde(default)]
    pub mobile: Option<String>,

    /// Department ids
    #[serde(default)]
    pub department: Vec<i64>,

    /// Job title
    #[serde(default)]
    pub position: Option<String>,

    /// `"1"` male, `"2"` female, `"0"` unset
    #[serde(default)]
    pub gender: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Avatar URL
    #[serde(default)]
    pub avatar: Option<String>,

    /// Activation status
    #[serde(default)]
    pub status: Option<i64>,

    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Build a profile from a provider payload, dropping the
    /// `errcode`/`errmsg` envelope
    ///
    /// # Errors
    /// Returns the serde error when a typed field has the wrong shape.
    pub fn from_payload(payload: Value) -> Result<Self, serde_json::Error> {
        let mut profile: Self = serde_json::from_value(payload)?;
        profile.extra.remove("errcode");
        profile.extra.remove("errmsg");
        Ok(profile)
    }
}

/// Authorization entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Request comes from inside the WeCom in-app browser
    Browser,
    /// Scan-to-login QR page
    Qr,
    /// Embedded web login component
    Component,
}

impl EntryMode {
    /// Short name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Qr => "qr",
            Self::Component => "component",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one authorization redirect
///
/// Built fresh for every request from the configured template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeParams {
    /// Effective callback URL
    pub redirect_uri: String,

    /// Requested scope; each entry mode has its own default
    pub scope: Option<String>,

    /// Opaque state; defaults to `"state"`
    pub state: Option<String>,

    /// Additional provider fields (e.g. `href`, `lang`)
    pub extra: BTreeMap<String, String>,
}

impl AuthorizeParams {
    /// Query keys that always may override a parameter
    pub const OVERRIDABLE_KEYS: [&'static str; 3] = ["redirect_uri", "scope", "state"];

    /// Absorb overrides from an inbound query string
    ///
    /// Only keys the template already defines are taken: the fixed
    /// [`Self::OVERRIDABLE_KEYS`] and the keys present in `extra`. Empty
    /// values are ignored.
    pub fn apply_overrides<'a, I>(&mut self, query: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in query {
            if value.is_empty() {
                continue;
            }
            match key {
                "redirect_uri" => self.redirect_uri = value.to_string(),
                "scope" => self.scope = Some(value.to_string()),
                "state" => self.state = Some(value.to_string()),
                _ => {
                    if let Some(slot) = self.extra.get_mut(key) {
                        value.clone_into(slot);
                    }
                }
            }
        }
    }
}
