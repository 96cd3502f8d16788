//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reason::ApiReason;

/// Main error type for Steward
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StewardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// The local token store is absent or unreadable. The operator has to
    /// re-run the interactive consent flow to recreate it.
    #[error("Invalid credentials file: {0}")]
    InvalidCredentialsFile(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Network error: {0}")]
    Network(String),

    /// A classified remote API failure. Callers branch on `reason`.
    #[error("API error ({reason}): {message}")]
    Api { reason: ApiReason, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Process exit code for an invocation that completed with soft errors only.
///
/// Worker processes use this to signal "done, but some items were skipped"
/// back to the batch scheduler; it is a success from the batch's point of
/// view.
pub const EXIT_CODE_SOFT: i32 = 3;

impl StewardError {
    /// Distinguishing process exit code for fatal errors.
    ///
    /// Configuration-class failures get their own codes so wrapping scripts
    /// can tell "fix your config" apart from "the remote call failed".
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 13,
            Self::Auth(_) => 14,
            Self::InvalidCredentialsFile(_) => 16,
            Self::Signer(_) => 17,
            _ => 1,
        }
    }
}

/// Result type alias for Steward operations
pub type Result<T> = std::result::Result<T, StewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_class_errors_have_distinct_exit_codes() {
        let codes = [
            StewardError::Config("x".into()).exit_code(),
            StewardError::Auth("x".into()).exit_code(),
            StewardError::InvalidCredentialsFile("x".into()).exit_code(),
            StewardError::Signer("x".into()).exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|c| *c != 0 && *c != 1));
    }

    #[test]
    fn api_error_exit_code_is_general_fatal() {
        let err = StewardError::Api {
            reason: ApiReason::NotFound,
            message: "user not found".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("not_found"));
    }

    #[test]
    fn errors_round_trip_through_serde() {
        let err = StewardError::Api {
            reason: ApiReason::RateLimited,
            message: "slow down".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: StewardError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, StewardError::Api { reason: ApiReason::RateLimited, .. }));
    }
}
