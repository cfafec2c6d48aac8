//! WeCom server API client
//!
//! Issues the three outbound calls of the login flow:
//! - `cgi-bin/gettoken`: service access token
//! - `cgi-bin/user/getuserinfo`: authorization code to member id
//! - `cgi-bin/user/get`: member profile
//!
//! Responses are classified in two layers. A failed HTTP exchange is a
//! transport error; a body that is not JSON is a parse error; a JSON body
//! with a non-zero `errcode` is a provider error even though HTTP succeeded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::traits::WeComApi;
use super::types::{ServiceToken, SubjectIdentity, UserProfile};
use crate::config::WeComConfig;
use crate::error::{ApiError, ConfigError, ProviderError};

const TOKEN_PATH: &str = "cgi-bin/gettoken";
const USER_INFO_PATH: &str = "cgi-bin/user/getuserinfo";
const USER_GET_PATH: &str = "cgi-bin/user/get";

/// reqwest-backed [`WeComApi`] implementation
#[derive(Debug, Clone)]
pub struct WeComClient {
    client: Client,
    token_url: Url,
    user_info_url: Url,
    user_get_url: Url,
}

impl WeComClient {
    /// Create a client for the API base and timeout in `config`
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if `api_base_url` cannot be parsed.
    ///
    /// # Examples
    /// ```
    /// use wecom_auth::{WeComClient, WeComConfig};
    ///
    /// let config = WeComConfig::new("ww123", "secret", "1000002");
    /// let client = WeComClient::new(&config).unwrap();
    /// assert_eq!(client.token_url().as_str(), "https://qyapi.weixin.qq.com/cgi-bin/gettoken");
    /// ```
    pub fn new(config: &WeComConfig) -> Result<Self, ConfigError> {
        let builder =
            Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self::with_client(client, &config.api_base_url)
    }

    /// Create a client around an existing reqwest client
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if `api_base_url` cannot be parsed.
    pub fn with_client(client: Client, api_base_url: &str) -> Result<Self, ConfigError> {
        let invalid = |e: url::ParseError| ConfigError::Invalid {
            field: "api_base_url",
            reason: e.to_string(),
        };

        let mut base = Url::parse(api_base_url).map_err(invalid)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            token_url: base.join(TOKEN_PATH).map_err(invalid)?,
            user_info_url: base.join(USER_INFO_PATH).map_err(invalid)?,
            user_get_url: base.join(USER_GET_PATH).map_err(invalid)?,
        })
    }

    /// Service token endpoint
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// GET `endpoint` with `query` and decode the WeCom response
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(query);

        // Query strings carry secrets; log the path only
        debug!(endpoint = endpoint.path(), "calling WeCom API");

        let response = self.client.get(url).send().await?.error_for_status()?;
        let status = response.status();
        let body = response.text().await?;
        debug!(endpoint = endpoint.path(), %status, "received WeCom response");

        let payload = parse_payload(&body)?;
        Ok(serde_json::from_value(payload)?)
    }
}

/// Parse a response body and surface any provider error it carries
pub(crate) fn parse_payload(body: &str) -> Result<Value, ApiError> {
    let payload: Value = serde_json::from_str(body)?;

    if let Some(err) = ProviderError::from_payload(&payload) {
        debug!(errcode = err.errcode, errmsg = %err.errmsg, "WeCom returned an error payload");
        return Err(ApiError::Provider(err));
    }

    Ok(payload)
}

#[async_trait]
impl WeComApi for WeComClient {
    async fn fetch_service_token(
        &self,
        corp_id: &str,
        corp_secret: &str,
    ) -> Result<ServiceToken, ApiError> {
        self.get_json(&self.token_url, &[("corpid", corp_id), ("corpsecret", corp_secret)]).await
    }

    async fn resolve_subject_id(
        &self,
        access_token: &str,
        code: &str,
    ) -> Result<SubjectIdentity, ApiError> {
        self.get_json(&self.user_info_url, &[("access_token", access_token), ("code", code)]).await
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<UserProfile, ApiError> {
        let payload: Value = self
            .get_json(&self.user_get_url, &[("access_token", access_token), ("userid", user_id)])
            .await?;
        Ok(UserProfile::from_payload(payload)?)
    }
}
