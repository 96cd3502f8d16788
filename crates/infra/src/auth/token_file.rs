//! Stored-user-token file
//!
//! A small JSON file holding the OAuth client and refresh token for the
//! stored-user grant strategy. Anything wrong with the file (absent,
//! unreadable, unparseable) is the same error to callers: the credentials
//! file is invalid and the user must re-authorize.

use std::path::PathBuf;

use async_trait::async_trait;
use steward_core::auth::{StoredToken, TokenStore};
use steward_domain::{Result, StewardError};
use tracing::debug;

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<StoredToken> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StewardError::InvalidCredentialsFile(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))
        })?;

        let token: StoredToken = serde_json::from_str(&text).map_err(|e| {
            StewardError::InvalidCredentialsFile(format!(
                "malformed token file {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), "loaded stored token");
        Ok(token)
    }

    async fn save(&self, token: &StoredToken) -> Result<()> {
        let text = serde_json::to_string_pretty(token)
            .map_err(|e| StewardError::Internal(format!("failed to serialize token: {e}")))?;
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            StewardError::Internal(format!("cannot write {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "saved stored token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        let token = StoredToken {
            client_id: "abc.apps.example.com".to_string(),
            client_secret: "s3cret".to_string(),
            refresh_token: "1//refresh".to_string(),
            scopes: vec!["scope.a".to_string()],
        };
        store.save(&token).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.client_id, token.client_id);
        assert_eq!(loaded.refresh_token, token.refresh_token);
        assert_eq!(loaded.scopes, token.scopes);
    }

    #[tokio::test]
    async fn missing_file_is_invalid_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nope.json"));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StewardError::InvalidCredentialsFile(_)));
    }

    #[tokio::test]
    async fn corrupt_file_is_invalid_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileTokenStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, StewardError::InvalidCredentialsFile(_)));
    }
}
