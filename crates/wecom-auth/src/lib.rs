//! WeCom (WeChat Work) OAuth2 delegated-authentication adapter.
//!
//! Given an inbound request the [`auth::WeComStrategy`] either redirects the
//! user to one of WeCom's three authorization entry points, or, when WeCom
//! calls back with an authorization code, resolves that code to a member
//! profile and hands it to application-supplied verification logic.
//!
//! # Module Organization
//!
//! - **[`auth`]**: token lifecycle, provider client, request view and the
//!   authentication strategy
//! - **[`config`]**: configuration model, validation and loading
//! - **[`error`]**: error taxonomy shared by every component
//! - **[`time`]**: clock abstraction used for token expiry
//! - **`testing`**: in-memory mocks and `MockClock` (feature `test-utils`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod config;
pub mod error;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    AccessToken, AuthOutcome, AuthRequest, EntryMode, FileTokenStore, MemoryTokenStore,
    TokenManager, TokenStore, UserProfile, Verification, Verifier, WeComApi, WeComClient,
    WeComStrategy,
};
pub use config::WeComConfig;
pub use error::{
    ApiError, AuthError, ConfigError, ErrorKind, ProviderError, StoreError, TokenError,
};
pub use time::{Clock, SystemClock};
