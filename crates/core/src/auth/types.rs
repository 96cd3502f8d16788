//! Credential and token-store value types

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An access credential bound to one scope set and (optionally) one
/// impersonated subject.
///
/// Refreshing replaces only the token value and expiry; scopes and subject
/// are fixed at derivation. A credential is never reused across a different
/// scope set or subject; callers re-derive instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: DateTime<Utc>,
    scopes: BTreeSet<String>,
    subject: Option<String>,
}

impl Credential {
    #[must_use]
    pub fn new(
        access_token: String,
        expires_in_secs: i64,
        scopes: impl IntoIterator<Item = impl Into<String>>,
        subject: Option<String>,
    ) -> Self {
        Self {
            access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: scopes.into_iter().map(Into::into).collect(),
            subject,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True when the token is expired or expires within `threshold_secs`.
    #[must_use]
    pub fn is_expired(&self, threshold_secs: i64) -> bool {
        Utc::now() + Duration::seconds(threshold_secs) >= self.expires_at
    }

    /// A copy with a fresh token value and expiry, everything else intact.
    #[must_use]
    pub fn renewed(&self, access_token: String, expires_in_secs: i64) -> Self {
        Self {
            access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: self.scopes.clone(),
            subject: self.subject.clone(),
        }
    }
}

/// Contents of the stored-user-token file (consumed, not defined here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Token endpoint response for a successful grant exchange (RFC 6749).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrantResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewal_preserves_scopes_and_subject() {
        let original = Credential::new(
            "tok-1".into(),
            3600,
            ["scope.a", "scope.b"],
            Some("admin@example.com".into()),
        );

        let renewed = original.renewed("tok-2".into(), 7200);

        assert_eq!(renewed.access_token(), "tok-2");
        assert_eq!(renewed.scopes(), original.scopes());
        assert_eq!(renewed.subject(), original.subject());
        assert!(renewed.expires_at() > original.expires_at());
    }

    #[test]
    fn expiry_check_honors_threshold() {
        let credential = Credential::new("tok".into(), 60, ["s"], None);
        assert!(!credential.is_expired(0));
        assert!(credential.is_expired(300));
    }

    #[test]
    fn stored_token_parses_without_scopes() {
        let json = r#"{
            "client_id": "abc.apps.example.com",
            "client_secret": "s3cret",
            "refresh_token": "1//refresh"
        }"#;
        let token: StoredToken = serde_json::from_str(json).unwrap();
        assert!(token.scopes.is_empty());
    }
}
