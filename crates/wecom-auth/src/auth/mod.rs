//! WeCom OAuth2 login
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  WeComStrategy  │  Per-request orchestrator
//! └────────┬────────┘
//!          │
//!          ├──► AuthorizeUrlBuilder  (browser / QR / component redirects)
//!          ├──► TokenManager         (service token lifecycle)
//!          │         │
//!          │         └──► TokenStore (application-supplied cache)
//!          ├──► WeComApi             (gettoken, getuserinfo, user/get)
//!          └──► Verifier             (application-supplied)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use wecom_auth::auth::{AuthenticateOptions, Verification};
//! use wecom_auth::error::VerifyError;
//! use wecom_auth::{
//!     AuthOutcome, AuthRequest, MemoryTokenStore, UserProfile, Verifier, WeComConfig,
//!     WeComStrategy,
//! };
//!
//! struct Members;
//!
//! #[async_trait]
//! impl Verifier for Members {
//!     type User = String;
//!
//!     async fn verify(
//!         &self,
//!         _request: Option<&AuthRequest>,
//!         profile: UserProfile,
//!     ) -> Result<Verification<String>, VerifyError> {
//!         Ok(profile.id.map_or_else(|| Verification::fail(None), Verification::success))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WeComConfig::new("ww123", "secret", "1000002")
//!         .with_callback_url("https://app.example.com/auth/wecom/callback");
//!     let strategy = WeComStrategy::new(config, Members, Arc::new(MemoryTokenStore::new()))?;
//!
//!     let request = AuthRequest::new("/auth/wecom/callback?code=abc&state=state");
//!     match strategy.authenticate(&request, &AuthenticateOptions::default()).await {
//!         AuthOutcome::Redirect { location, .. } => println!("redirect to {location}"),
//!         AuthOutcome::Success { user, .. } => println!("logged in as {user}"),
//!         AuthOutcome::Fail { .. } => println!("login rejected"),
//!         AuthOutcome::Error(e) => eprintln!("login failed: {e}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod authorize;
pub mod client;
pub mod request;
pub mod store;
pub mod strategy;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use authorize::AuthorizeUrlBuilder;
pub use client::WeComClient;
pub use request::{AuthRequest, RequestKind};
pub use store::{FileTokenStore, MemoryTokenStore};
pub use strategy::{AuthOutcome, AuthenticateOptions, Verification, Verifier, WeComStrategy};
pub use token_manager::TokenManager;
pub use traits::{TokenStore, WeComApi};
pub use types::{AccessToken, AuthorizeParams, EntryMode, ServiceToken, SubjectIdentity, UserProfile};
