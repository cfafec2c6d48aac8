//! Token store implementations
//!
//! - [`MemoryTokenStore`]: lives as long as the process
//! - [`FileTokenStore`]: JSON file on disk, survives restarts

use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::TokenStore;
use super::types::AccessToken;
use crate::error::StoreError;

/// In-process token cache
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<AccessToken>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `token`
    #[must_use]
    pub fn with_token(token: AccessToken) -> Self {
        Self { token: RwLock::new(Some(token)) }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load_token(&self) -> Result<AccessToken, StoreError> {
        self.token.read().await.clone().ok_or(StoreError::NotFound)
    }

    async fn save_token(&self, token: &AccessToken) -> Result<(), StoreError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }
}

/// Token cache persisted as a JSON file
///
/// Each write goes to its own uniquely named temporary file in the target
/// directory, which is then renamed over the target. A reader never
/// observes a half-written token and concurrent writers never share a
/// temporary file; the last rename wins.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load_token(&self) -> Result<AccessToken, StoreError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&contents)?)
    }

    async fn save_token(&self, token: &AccessToken) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(token)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &contents))
            .await
            .map_err(|e| StoreError::Backend(format!("token write task failed: {e}")))??;

        debug!(path = %self.path.display(), "access token written to file store");
        Ok(())
    }
}

/// Write `contents` to a fresh temporary file beside `path`, then rename it
/// into place
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;

    Ok(())
}
