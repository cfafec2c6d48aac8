//! Configuration loader
//!
//! Loads [`WeComConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from the given file
//! 3. Supports JSON and TOML formats (detected by extension)
//!
//! Every configuration returned here has passed [`WeComConfig::validate`].
//!
//! ## Environment Variables
//! - `WECOM_CORP_ID`, `WECOM_CORP_SECRET`, `WECOM_AGENT_ID`: required
//! - `WECOM_CALLBACK_URL`: callback URL or path
//! - `WECOM_SCOPE`: scopes, separated by whitespace or commas
//! - `WECOM_STATE`: default state
//! - `WECOM_WEB_LOGIN_COMPONENT`: use the web login component (true/false)
//! - `WECOM_TRUST_PROXY`: honour forwarding headers (true/false)
//! - `WECOM_PASS_REQUEST_TO_VERIFIER`: pass the request to the verifier
//!   (true/false)
//! - `WECOM_API_BASE_URL`: alternate API base

use std::path::Path;

use super::WeComConfig;
use crate::error::ConfigError;

/// Load configuration, preferring the environment and falling back to a file
///
/// # Errors
/// Returns the file error when the environment is incomplete and the file
/// cannot be loaded, or the environment error when no file is given.
pub fn load(path: Option<&Path>) -> Result<WeComConfig, ConfigError> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => match path {
            Some(path) => {
                tracing::debug!(error = %e, "Failed to load from environment, trying file");
                load_from_file(path)
            }
            None => Err(e),
        },
    }
}

/// Load configuration from `WECOM_*` environment variables
///
/// # Errors
/// Returns [`ConfigError::Missing`] when a required variable is absent and
/// any validation error of the resulting config.
pub fn load_from_env() -> Result<WeComConfig, ConfigError> {
    from_vars(|key| std::env::var(key).ok())
}

/// Load configuration from a TOML or JSON file
///
/// # Errors
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Format`] if it cannot be parsed.
pub fn load_from_file(path: &Path) -> Result<WeComConfig, ConfigError> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)?;
    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<WeComConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Format(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Format(format!("Invalid JSON format: {e}"))),
        _ => Err(ConfigError::Format(format!("Unsupported config format: {extension}"))),
    }
}

fn from_vars<F>(var: F) -> Result<WeComConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str, field: &'static str| {
        var(key).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(field))
    };
    let flag = |key: &str| {
        var(key).is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    };

    let mut config = WeComConfig::new(
        required("WECOM_CORP_ID", "corp_id")?,
        required("WECOM_CORP_SECRET", "corp_secret")?,
        required("WECOM_AGENT_ID", "agent_id")?,
    );

    config.callback_url = var("WECOM_CALLBACK_URL");
    config.state = var("WECOM_STATE");
    if let Some(scope) = var("WECOM_SCOPE") {
        config.scope = scope
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(base) = var("WECOM_API_BASE_URL") {
        config.api_base_url = base;
    }
    config.web_login_component = flag("WECOM_WEB_LOGIN_COMPONENT");
    config.trust_proxy = flag("WECOM_TRUST_PROXY");
    config.pass_request_to_verifier = flag("WECOM_PASS_REQUEST_TO_VERIFIER");

    config.validate()?;
    Ok(config)
}
