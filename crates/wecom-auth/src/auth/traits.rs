//! Traits for provider and token store operations
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (the WeCom server API, persistent token storage).

use async_trait::async_trait;

use super::types::{AccessToken, ServiceToken, SubjectIdentity, UserProfile};
use crate::error::{ApiError, StoreError};

/// Outbound WeCom server API calls
///
/// Every method is a single request. Implementations classify failures as
/// transport, parse or provider errors (see [`ApiError`]).
#[async_trait]
pub trait WeComApi: Send + Sync {
    /// Obtain a service access token for the corporation application
    ///
    /// # Errors
    /// Returns error if the call fails or WeCom rejects the credentials
    async fn fetch_service_token(
        &self,
        corp_id: &str,
        corp_secret: &str,
    ) -> Result<ServiceToken, ApiError>;

    /// Exchange an authorization code for the identity behind it
    ///
    /// # Errors
    /// Returns error if the call fails or the code is invalid, expired or
    /// already used
    async fn resolve_subject_id(
        &self,
        access_token: &str,
        code: &str,
    ) -> Result<SubjectIdentity, ApiError>;

    /// Fetch the full member profile for a resolved member id
    ///
    /// # Errors
    /// Returns error if the call fails or the member does not exist
    async fn fetch_profile(&self, access_token: &str, user_id: &str)
        -> Result<UserProfile, ApiError>;
}

/// Persistent access token cache supplied by the embedding application
///
/// The store holds no logic; the token manager decides when to refresh.
/// Implementations must provide their own concurrency safety.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the current token
    ///
    /// # Errors
    /// Returns error if no token is stored or it cannot be read
    async fn load_token(&self) -> Result<AccessToken, StoreError>;

    /// Persist a newly acquired token, replacing the previous one
    ///
    /// # Errors
    /// Returns error if the token cannot be written
    async fn save_token(&self, token: &AccessToken) -> Result<(), StoreError>;
}
