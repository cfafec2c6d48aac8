//! Authorization URL builders
//!
//! WeCom exposes three authorization entry points, each with its own base
//! URL and parameter set. Building a URL is pure string work; nothing here
//! touches the network.

use super::types::{AuthorizeParams, EntryMode};

/// In-app browser authorization (web page OAuth)
pub const BROWSER_AUTHORIZE_URL: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";

/// Scan-to-login QR page
pub const QR_AUTHORIZE_URL: &str = "https://open.work.weixin.qq.com/wwopen/sso/qrConnect";

/// Embedded web login component
pub const COMPONENT_AUTHORIZE_URL: &str = "https://login.work.weixin.qq.com/wwlogin/sso/login";

const DEFAULT_STATE: &str = "state";
const BROWSER_DEFAULT_SCOPE: &str = "snsapi_base";
const QR_DEFAULT_SCOPE: &str = "snsapi_login";

/// Builds authorization URLs for one corporation application
///
/// `agentid` always comes from the static configuration; it is never taken
/// from per-request parameters.
#[derive(Debug, Clone)]
pub struct AuthorizeUrlBuilder {
    corp_id: String,
    agent_id: String,
}

impl AuthorizeUrlBuilder {
    /// Create a builder for the given corporation and application
    #[must_use]
    pub fn new(corp_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self { corp_id: corp_id.into(), agent_id: agent_id.into() }
    }

    /// Build the URL for `mode`
    #[must_use]
    pub fn build(&self, mode: EntryMode, params: &AuthorizeParams) -> String {
        match mode {
            EntryMode::Browser => self.browser_url(params),
            EntryMode::Qr => self.qr_url(params),
            EntryMode::Component => self.component_url(params),
        }
    }

    /// URL for requests made inside the WeCom browser
    #[must_use]
    pub fn browser_url(&self, params: &AuthorizeParams) -> String {
        let fixed = vec![
            ("appid", self.corp_id.clone()),
            ("redirect_uri", params.redirect_uri.clone()),
            ("response_type", "code".to_string()),
            ("scope", params.scope.clone().unwrap_or_else(|| BROWSER_DEFAULT_SCOPE.to_string())),
            ("state", state_or_default(params)),
            ("agentid", self.agent_id.clone()),
        ];

        // The in-app browser only honours the redirect with this fragment
        format!("{}#wechat_redirect", with_query(BROWSER_AUTHORIZE_URL, fixed, params))
    }

    /// URL for the scan-to-login page
    #[must_use]
    pub fn qr_url(&self, params: &AuthorizeParams) -> String {
        let fixed = vec![
            ("appid", self.corp_id.clone()),
            ("agentid", self.agent_id.clone()),
            ("redirect_uri", params.redirect_uri.clone()),
            ("response_type", "code".to_string()),
            ("scope", params.scope.clone().unwrap_or_else(|| QR_DEFAULT_SCOPE.to_string())),
            ("state", state_or_default(params)),
        ];

        with_query(QR_AUTHORIZE_URL, fixed, params)
    }

    /// URL for the embedded web login component
    #[must_use]
    pub fn component_url(&self, params: &AuthorizeParams) -> String {
        let fixed = vec![
            ("login_type", "CorpApp".to_string()),
            ("appid", self.corp_id.clone()),
            ("agentid", self.agent_id.clone()),
            ("redirect_uri", params.redirect_uri.clone()),
            ("state", state_or_default(params)),
        ];

        with_query(COMPONENT_AUTHORIZE_URL, fixed, params)
    }
}

fn state_or_default(params: &AuthorizeParams) -> String {
    params.state.clone().unwrap_or_else(|| DEFAULT_STATE.to_string())
}

/// Append the fixed pairs, then every extra whose key the shape does not
/// already define
fn with_query(base: &str, fixed: Vec<(&str, String)>, params: &AuthorizeParams) -> String {
    let encode = |k: &str, v: &str| format!("{k}={}", urlencoding::encode(v));

    let mut pairs: Vec<String> = fixed.iter().map(|(k, v)| encode(k, v)).collect();
    pairs.extend(
        params
            .extra
            .iter()
            .filter(|(key, _)| !fixed.iter().any(|(fixed_key, _)| *fixed_key == key.as_str()))
            .map(|(k, v)| encode(k, v)),
    );

    format!("{base}?{}", pairs.join("&"))
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::authorize.
    use std::collections::BTreeMap;

    use super::*;

    fn params() -> AuthorizeParams {
        AuthorizeParams {
            redirect_uri: "https://app.example.com/cb".to_string(),
            scope: None,
            state: None,
            extra: BTreeMap::new(),
        }
    }

    fn builder() -> AuthorizeUrlBuilder {
        AuthorizeUrlBuilder::new("ww123", "1000002")
    }

    #[test]
    fn test_browser_url_shape() {
        let url = builder().browser_url(&params());

        assert!(url.starts_with("https://open.weixin.qq.com/connect/oauth2/authorize?appid=ww123&"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=snsapi_base"));
        assert!(url.contains("state=state"));
        assert!(url.contains("agentid=1000002"));
        assert!(url.ends_with("#wechat_redirect"));
    }

    #[test]
    fn test_qr_url_shape() {
        let mut p = params();
        p.state = Some("xyz".to_string());
        let url = builder().qr_url(&p);

        assert!(url.starts_with("https://open.work.weixin.qq.com/wwopen/sso/qrConnect?"));
        assert!(url.contains("appid=ww123"));
        assert!(url.contains("agentid=1000002"));
        assert!(url.contains("scope=snsapi_login"));
        assert!(url.contains("state=xyz"));
        assert!(!url.contains('#'));
    }

    #[test]
    fn test_component_url_shape() {
        let url = builder().component_url(&params());

        assert!(url.starts_with(
            "https://login.work.weixin.qq.com/wwlogin/sso/login?login_type=CorpApp&appid=ww123"
        ));
        assert!(url.contains("agentid=1000002"));
        assert!(!url.contains("scope="));
        assert!(!url.contains("response_type"));
    }

    #[test]
    fn test_extras_appended_without_shadowing_fixed_keys() {
        let mut p = params();
        p.extra.insert("href".to_string(), "https://cdn.example.com/qr.css".to_string());
        p.extra.insert("appid".to_string(), "evil".to_string());

        let url = builder().qr_url(&p);

        assert!(url.ends_with("&href=https%3A%2F%2Fcdn.example.com%2Fqr.css"));
        assert!(!url.contains("appid=evil"));
    }

    #[test]
    fn test_build_dispatches_on_mode() {
        let b = builder();
        let p = params();
        assert_eq!(b.build(EntryMode::Browser, &p), b.browser_url(&p));
        assert_eq!(b.build(EntryMode::Qr, &p), b.qr_url(&p));
        assert_eq!(b.build(EntryMode::Component, &p), b.component_url(&p));
    }
}
