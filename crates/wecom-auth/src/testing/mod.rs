//! Testing utilities
//!
//! In-memory stand-ins for the strategy's collaborators:
//! - **[`mocks`]**: [`MockWeComApi`], [`MockTokenStore`] and
//!   [`RecordingVerifier`]
//! - **[`time`]**: [`MockClock`], a manually advanced [`crate::time::Clock`]
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use wecom_auth::testing::{MockTokenStore, MockWeComApi, RecordingVerifier};
//! use wecom_auth::{WeComConfig, WeComStrategy};
//!
//! let api = Arc::new(MockWeComApi::new());
//! let strategy = WeComStrategy::with_api(
//!     WeComConfig::new("ww123", "secret", "1000002").with_callback_url("https://a.example.com/cb"),
//!     RecordingVerifier::accepting(),
//!     Arc::new(MockTokenStore::new()),
//!     api,
//! )
//! .unwrap();
//! assert_eq!(strategy.config().agent_id, "1000002");
//! ```

pub mod mocks;
pub mod time;

pub use mocks::{MockTokenStore, MockWeComApi, RecordingVerifier, VerifierResponse};
pub use time::MockClock;
