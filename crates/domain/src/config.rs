//! Application configuration
//!
//! One immutable `Config` value is built at startup and passed into each
//! component constructor. There are no process-wide mutable settings.

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub batch: BatchConfig,
}

/// Remote API call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API surface.
    pub base_url: String,
    /// Per-request network timeout in seconds. Not counted against retries.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry ceiling for retryable reasons (attempts, not elapsed time).
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Preferred page size for paginated listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Where the signing key material lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeySource {
    /// PEM-encoded RSA private key on disk.
    Pem { path: String },
    /// Key held in a hardware PIV device slot; never leaves the device.
    Piv {
        /// Device serial; required when more than one device may be attached.
        serial: Option<u32>,
        /// PIV PIN, when the slot's policy requires verification.
        pin: Option<String>,
    },
}

/// Credential and identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path of the stored-user-token JSON file.
    pub token_store_path: Option<String>,
    /// Service account identity for domain-wide delegation.
    pub service_account_email: Option<String>,
    /// OAuth client id of the installed application.
    pub client_id: Option<String>,
    /// Signing key material for service-identity grants.
    pub key_source: Option<KeySource>,
    /// Token endpoint used for grant exchanges.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Default impersonated subject (the domain administrator).
    pub admin_subject: Option<String>,
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on concurrent worker processes per pool generation.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Emit a progress line every this many finished items.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    5
}

fn default_page_size() -> u32 {
    500
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_max_workers() -> usize {
    25
}

fn default_progress_interval() -> usize {
    25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let toml_content = r#"
[api]
base_url = "https://admin.example.com"

[auth]
token_store_path = "/tmp/token.json"

[batch]
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.api.max_retries, 5);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.batch.max_workers, 25);
        assert!(config.auth.service_account_email.is_none());
    }

    #[test]
    fn key_source_variants_deserialize() {
        let pem: KeySource =
            serde_json::from_str(r#"{"kind":"pem","path":"/keys/sa.pem"}"#).unwrap();
        assert!(matches!(pem, KeySource::Pem { .. }));

        let piv: KeySource =
            serde_json::from_str(r#"{"kind":"piv","serial":15012345,"pin":"123456"}"#).unwrap();
        match piv {
            KeySource::Piv { serial, pin } => {
                assert_eq!(serial, Some(15_012_345));
                assert_eq!(pin.as_deref(), Some("123456"));
            }
            other => panic!("expected piv source, got {other:?}"),
        }
    }
}
