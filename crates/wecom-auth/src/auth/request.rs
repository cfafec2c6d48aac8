//! Inbound request view
//!
//! The host framework owns the real request object. [`AuthRequest`] is the
//! small slice of it the strategy reads: the request target, headers and
//! whether the connection was TLS.

use std::collections::BTreeMap;

use url::Url;

use crate::error::AuthError;

/// User agent marker of the WeCom in-app browser
pub const WECOM_BROWSER_MARKER: &str = "wxwork";

/// What an inbound request asks the strategy to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind<'a> {
    /// WeCom redirected back with an authorization code
    Callback {
        /// Authorization code
        code: &'a str,
        /// State echoed by WeCom
        state: Option<&'a str>,
    },
    /// No code yet; send the user to WeCom
    Redirect,
}

/// Request as seen by the strategy
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    target: String,
    headers: BTreeMap<String, String>,
    query: Vec<(String, String)>,
    encrypted: bool,
}

impl AuthRequest {
    /// Create a request for `target`, the path and query as received
    /// (e.g. `/auth/wecom?code=abc&state=xyz`)
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let query = target
            .split_once('?')
            .map(|(_, query)| {
                let query = query.split('#').next().unwrap_or_default();
                url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
            })
            .unwrap_or_default();

        Self { target, headers: BTreeMap::new(), query, encrypted: false }
    }

    /// Add a header; names are case-insensitive
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Mark the connection as TLS
    #[must_use]
    pub const fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Request target as received
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// First query value for `key`
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// All decoded query pairs in order
    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `User-Agent` header
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Whether the request comes from the WeCom in-app browser
    #[must_use]
    pub fn is_wecom_browser(&self) -> bool {
        self.user_agent().is_some_and(|ua| ua.contains(WECOM_BROWSER_MARKER))
    }

    /// Classify the request; a non-empty `code` makes it a callback
    #[must_use]
    pub fn kind(&self) -> RequestKind<'_> {
        match self.query_param("code").filter(|code| !code.is_empty()) {
            Some(code) => RequestKind::Callback { code, state: self.query_param("state") },
            None => RequestKind::Redirect,
        }
    }

    /// Reconstruct the absolute URL the client requested
    ///
    /// With `trust_proxy`, `X-Forwarded-Proto` and `X-Forwarded-Host` take
    /// precedence over the connection and `Host` header.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidRequest`] if no host is known or the
    /// pieces do not form a URL.
    pub fn original_url(&self, trust_proxy: bool) -> Result<Url, AuthError> {
        if let Ok(url) = Url::parse(&self.target) {
            return Ok(url);
        }

        let forwarded = |name: &str| {
            self.header(name)
                .filter(|_| trust_proxy)
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let protocol = forwarded("x-forwarded-proto")
            .unwrap_or(if self.encrypted { "https" } else { "http" });
        let host = forwarded("x-forwarded-host")
            .or_else(|| self.header("host"))
            .ok_or_else(|| AuthError::InvalidRequest("request has no Host header".to_string()))?;

        let separator = if self.target.starts_with('/') { "" } else { "/" };
        Url::parse(&format!("{protocol}://{host}{separator}{}", self.target))
            .map_err(|e| AuthError::InvalidRequest(format!("cannot rebuild request URL: {e}")))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::request.
    use super::*;

    #[test]
    fn test_code_makes_callback() {
        let request = AuthRequest::new("/auth/wecom?code=abc&state=xyz");
        assert_eq!(request.kind(), RequestKind::Callback { code: "abc", state: Some("xyz") });
    }

    #[test]
    fn test_missing_or_empty_code_is_redirect() {
        assert_eq!(AuthRequest::new("/auth/wecom").kind(), RequestKind::Redirect);
        assert_eq!(AuthRequest::new("/auth/wecom?code=").kind(), RequestKind::Redirect);
        assert_eq!(AuthRequest::new("/auth/wecom?state=s").kind(), RequestKind::Redirect);
    }

    #[test]
    fn test_query_is_percent_decoded() {
        let request = AuthRequest::new("/login?callbackURL=https%3A%2F%2Fa.example.com%2Fcb&x=1+2");
        assert_eq!(request.query_param("callbackURL"), Some("https://a.example.com/cb"));
        assert_eq!(request.query_param("x"), Some("1 2"));
    }

    #[test]
    fn test_headers_case_insensitive_and_browser_marker() {
        let request = AuthRequest::new("/").with_header(
            "User-Agent",
            "Mozilla/5.0 (iPhone) MicroMessenger/8.0 wxwork/4.1.0",
        );
        assert!(request.is_wecom_browser());
        assert!(request.header("user-agent").is_some());

        assert!(!AuthRequest::new("/").is_wecom_browser());
    }

    #[test]
    fn test_original_url_from_host_header() {
        let request =
            AuthRequest::new("/login?next=1").with_header("Host", "app.example.com").with_encrypted(true);
        let url = request.original_url(false).unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/login?next=1");
    }

    #[test]
    fn test_forwarded_headers_only_with_trust_proxy() {
        let request = AuthRequest::new("/login")
            .with_header("Host", "10.0.0.5:8080")
            .with_header("X-Forwarded-Proto", "https, http")
            .with_header("X-Forwarded-Host", "app.example.com");

        assert_eq!(request.original_url(false).unwrap().as_str(), "http://10.0.0.5:8080/login");
        assert_eq!(request.original_url(true).unwrap().as_str(), "https://app.example.com/login");
    }

    #[test]
    fn test_original_url_without_host_is_invalid() {
        let result = AuthRequest::new("/login").original_url(false);
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }
}
