//! Service token lifecycle
//!
//! Keeps the corporation's service access token fresh:
//! - Token retrieval from the [`TokenStore`]
//! - Fresh acquisition when the stored token is expired or cannot be loaded
//! - Persistence of every freshly acquired token
//!
//! Refreshes are not deduplicated: two requests that both find an expired
//! token will both call `gettoken`. WeCom hands out the same token for
//! concurrent requests, so this only costs an extra call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::traits::{TokenStore, WeComApi};
use super::types::AccessToken;
use crate::error::TokenError;
use crate::time::{Clock, SystemClock};

/// Token manager with store fallback
pub struct TokenManager<A: WeComApi + ?Sized> {
    api: Arc<A>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    corp_id: String,
    corp_secret: String,
    expiry_margin_seconds: i64,
}

impl<A: WeComApi + ?Sized> TokenManager<A> {
    /// Create a new token manager
    ///
    /// # Arguments
    /// * `api` - Provider API used for fresh acquisition
    /// * `store` - Persistent token cache
    /// * `corp_id` - Corporation id (`corpid`)
    /// * `corp_secret` - Application secret (`corpsecret`)
    #[must_use]
    pub fn new(
        api: Arc<A>,
        store: Arc<dyn TokenStore>,
        corp_id: impl Into<String>,
        corp_secret: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store,
            clock: Arc::new(SystemClock),
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            expiry_margin_seconds: 0,
        }
    }

    /// Judge expiry against `clock` instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Treat tokens as expired `seconds` before their declared lifetime ends
    #[must_use]
    pub const fn with_expiry_margin(mut self, seconds: i64) -> Self {
        self.expiry_margin_seconds = seconds;
        self
    }

    /// Get a usable access token
    ///
    /// Returns the stored token when it is still fresh. Otherwise, or when
    /// the store cannot produce a token at all, acquires a fresh one. A load
    /// failure is logged and never returned.
    ///
    /// # Errors
    /// Returns error only if fresh acquisition fails
    pub async fn get_access_token(&self) -> Result<AccessToken, TokenError> {
        match self.store.load_token().await {
            Ok(token) if !self.is_expired(&token) => {
                debug!("Using stored access token");
                Ok(token)
            }
            Ok(_) => {
                debug!("Stored access token expired, acquiring a new one");
                self.fetch_fresh_token().await
            }
            Err(e) => {
                warn!(error = %e, "Failed to load stored access token, acquiring a new one");
                self.fetch_fresh_token().await
            }
        }
    }

    /// Acquire a new token from WeCom and persist it
    ///
    /// # Errors
    /// Returns [`TokenError::Acquire`] if the provider call fails and
    /// [`TokenError::Persist`] if the store rejects the new token.
    pub async fn fetch_fresh_token(&self) -> Result<AccessToken, TokenError> {
        let response = self.api.fetch_service_token(&self.corp_id, &self.corp_secret).await?;

        let token = AccessToken::new(response.access_token, response.expires_in, self.clock.now());

        self.store.save_token(&token).await.map_err(TokenError::Persist)?;

        info!(expires_in = token.expires_in, "Acquired and stored new access token");

        Ok(token)
    }

    /// Whether `token` is expired under this manager's clock and margin
    #[must_use]
    pub fn is_expired(&self, token: &AccessToken) -> bool {
        token.is_expired_within(self.expiry_margin_seconds, self.clock.now())
    }

    /// Configured expiry margin in seconds
    #[must_use]
    pub const fn expiry_margin(&self) -> i64 {
        self.expiry_margin_seconds
    }
}
