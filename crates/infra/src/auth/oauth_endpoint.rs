//! OAuth token endpoint client
//!
//! Form-POSTs grants to the configured token URI and parses RFC 6749
//! responses. Rejections come back as `StewardError::Api` with the
//! server's error code mapped onto an [`steward_domain::ApiReason`], so the
//! provider can tell an unrecoverable `invalid_grant` from a transient
//! endpoint failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use steward_core::auth::{GrantRequest, TokenEndpoint, TokenGrantResponse};
use steward_domain::{ApiReason, Result, StewardError};
use tracing::debug;

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTokenEndpoint {
    client: Client,
    token_uri: String,
}

impl HttpTokenEndpoint {
    /// # Errors
    /// Returns `StewardError::Config` when the HTTP client cannot be built.
    pub fn new(token_uri: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| StewardError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, token_uri: token_uri.into() })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange(&self, grant: GrantRequest<'_>) -> Result<TokenGrantResponse> {
        let params: Vec<(&str, &str)> = match &grant {
            GrantRequest::RefreshToken { client_id, client_secret, refresh_token } => vec![
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ],
            GrantRequest::JwtBearer { assertion } => {
                vec![("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion)]
            }
        };

        debug!(grant_type = params[0].1, "exchanging grant");

        let response = self
            .client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| StewardError::Network(format!("token endpoint unreachable: {e}")))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StewardError::Auth(format!("unreadable token response: {e}")))?;

        if (200..300).contains(&status) {
            return serde_json::from_value(body)
                .map_err(|e| StewardError::Auth(format!("malformed token response: {e}")));
        }

        // RFC 6749 §5.2 error body.
        let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
        let description = body
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or("no description");

        Err(StewardError::Api {
            reason: ApiReason::from_http(status, code),
            message: format!("{code}: {description}"),
        })
    }
}
