//! Credential provider with three grant strategies
//!
//! Strategy is chosen by which inputs are supplied and what identity data
//! is configured:
//!
//! 1. Stored user token, refreshed via the refresh-token grant.
//! 2. Domain-wide-delegated service identity: a signed JWT assertion
//!    exchanged for an access token.
//! 3. Audience-scoped self-signed JWT used directly as the bearer
//!    credential, for the narrow set of APIs that accept one.
//!
//! Derived credentials are cached per (scopes, subject, audience) binding;
//! a credential is never handed out for a different binding than it was
//! derived for.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use steward_domain::{ApiReason, AuthConfig, Result, StewardError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::jwt::signed_jwt;
use super::ports::{CredentialSource, GrantRequest, Signer, TokenEndpoint, TokenStore};
use super::types::Credential;

/// Lifetime of issued assertions and self-signed bearer JWTs.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh ahead of expiry by this margin.
const EXPIRY_THRESHOLD_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CredentialKey {
    scopes: Vec<String>,
    subject: Option<String>,
    audience: Option<String>,
}

impl CredentialKey {
    fn new(scopes: &[String], subject: Option<&str>, audience: Option<&str>) -> Self {
        let mut scopes = scopes.to_vec();
        scopes.sort_unstable();
        Self {
            scopes,
            subject: subject.map(ToString::to_string),
            audience: audience.map(ToString::to_string),
        }
    }
}

/// Obtains and refreshes access credentials.
pub struct CredentialProvider {
    endpoint: Arc<dyn TokenEndpoint>,
    store: Option<Arc<dyn TokenStore>>,
    signer: Option<Arc<dyn Signer>>,
    auth: AuthConfig,
    cache: RwLock<HashMap<CredentialKey, Credential>>,
}

impl CredentialProvider {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        store: Option<Arc<dyn TokenStore>>,
        signer: Option<Arc<dyn Signer>>,
        auth: AuthConfig,
    ) -> Self {
        Self { endpoint, store, signer, auth, cache: RwLock::new(HashMap::new()) }
    }

    /// Get a credential for the given scope set, optionally impersonating
    /// `subject`, optionally audience-scoped to one API.
    ///
    /// # Errors
    /// - `Config` when no usable identity is configured for the request.
    /// - `InvalidCredentialsFile` when the token store is absent/corrupt.
    /// - `Auth` when the token endpoint rejects the grant.
    /// - `Signer` when key material or the device fails.
    pub async fn get_credential(
        &self,
        scopes: &[String],
        subject: Option<&str>,
        audience: Option<&str>,
    ) -> Result<Credential> {
        let key = CredentialKey::new(scopes, subject, audience);

        {
            let cache = self.cache.read().await;
            if let Some(credential) = cache.get(&key) {
                if !credential.is_expired(EXPIRY_THRESHOLD_SECS) {
                    return Ok(credential.clone());
                }
            }
        }

        let credential = self.derive(scopes, subject, audience).await?;
        self.cache.write().await.insert(key, credential.clone());
        Ok(credential)
    }

    /// Re-derive the credential for a binding, replacing any cached value.
    ///
    /// Only the token value and expiry change; the scope set and subject of
    /// the returned credential are identical to the prior derivation.
    ///
    /// # Errors
    /// Same conditions as [`Self::get_credential`].
    pub async fn refresh(
        &self,
        scopes: &[String],
        subject: Option<&str>,
        audience: Option<&str>,
    ) -> Result<Credential> {
        let key = CredentialKey::new(scopes, subject, audience);
        let fresh = self.derive(scopes, subject, audience).await?;

        let mut cache = self.cache.write().await;
        let credential = match cache.get(&key) {
            // Renew the existing credential in place so scopes and subject
            // are carried over structurally.
            Some(existing) => {
                let renewed = existing.renewed(
                    fresh.access_token().to_string(),
                    (fresh.expires_at() - Utc::now()).num_seconds(),
                );
                info!(subject = ?renewed.subject(), "credential refreshed");
                renewed
            }
            None => fresh,
        };
        cache.insert(key, credential.clone());
        Ok(credential)
    }

    async fn derive(
        &self,
        scopes: &[String],
        subject: Option<&str>,
        audience: Option<&str>,
    ) -> Result<Credential> {
        if let Some(audience) = audience {
            return self.derive_self_signed(scopes, subject, audience);
        }
        if self.signer.is_some() && self.auth.service_account_email.is_some() {
            return self.derive_delegated(scopes, subject).await;
        }
        self.derive_stored_user(scopes).await
    }

    /// Strategy 3: self-signed JWT presented directly as the bearer token.
    /// No exchange; the JWT's audience is the API's own base URL.
    fn derive_self_signed(
        &self,
        scopes: &[String],
        subject: Option<&str>,
        audience: &str,
    ) -> Result<Credential> {
        let signer = self.require_signer()?;
        let email = self.require_service_account()?;
        let subject = subject.or(self.auth.admin_subject.as_deref());
        let now = Utc::now().timestamp();

        let claims = json!({
            "iss": email,
            "sub": subject.unwrap_or(email),
            "aud": audience,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        });

        let jwt = signed_jwt(signer.as_ref(), &claims)?;
        debug!(audience, "derived self-signed bearer JWT");
        Ok(Credential::new(
            jwt,
            ASSERTION_LIFETIME_SECS,
            scopes.iter().cloned(),
            subject.map(ToString::to_string),
        ))
    }

    /// Strategy 2: domain-wide delegation. Sign an assertion naming the
    /// service account and the impersonated subject, exchange it for an
    /// access token.
    async fn derive_delegated(
        &self,
        scopes: &[String],
        subject: Option<&str>,
    ) -> Result<Credential> {
        let signer = self.require_signer()?;
        let email = self.require_service_account()?;
        let subject = subject.or(self.auth.admin_subject.as_deref());
        let now = Utc::now().timestamp();

        let mut claims = json!({
            "iss": email,
            "scope": scopes.join(" "),
            "aud": self.auth.token_uri,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        });
        if let Some(subject) = subject {
            claims["sub"] = json!(subject);
        }

        let assertion = signed_jwt(signer.as_ref(), &claims)?;
        let response =
            self.exchange_once_retried(GrantRequest::JwtBearer { assertion: &assertion }).await?;

        debug!(subject = ?subject, "exchanged delegation assertion");
        Ok(Credential::new(
            response.access_token,
            response.expires_in,
            scopes.iter().cloned(),
            subject.map(ToString::to_string),
        ))
    }

    /// Strategy 1: stored user token, refreshed via the refresh-token grant.
    async fn derive_stored_user(&self, scopes: &[String]) -> Result<Credential> {
        let store = self.store.as_ref().ok_or_else(|| {
            StewardError::Config(
                "no token store and no service identity configured".to_string(),
            )
        })?;

        let stored = store.load().await?;
        let response = self
            .exchange_once_retried(GrantRequest::RefreshToken {
                client_id: &stored.client_id,
                client_secret: &stored.client_secret,
                refresh_token: &stored.refresh_token,
            })
            .await?;

        Ok(Credential::new(response.access_token, response.expires_in, scopes.iter().cloned(), None))
    }

    /// Exchange with at most one retry. A rejected grant (`invalid_grant`)
    /// fails immediately: retrying a bad grant is never useful.
    async fn exchange_once_retried(
        &self,
        grant: GrantRequest<'_>,
    ) -> Result<super::types::TokenGrantResponse> {
        match self.endpoint.exchange(grant.clone()).await {
            Ok(response) => Ok(response),
            Err(StewardError::Api { reason: ApiReason::InvalidGrant, message }) => {
                Err(StewardError::Auth(format!("grant rejected: {message}")))
            }
            Err(first) => {
                debug!(error = %first, "token exchange failed, retrying once");
                self.endpoint.exchange(grant).await.map_err(|second| {
                    StewardError::Auth(format!("token exchange failed: {second}"))
                })
            }
        }
    }

    fn require_signer(&self) -> Result<&Arc<dyn Signer>> {
        self.signer.as_ref().ok_or_else(|| {
            StewardError::Config("service identity requested but no signer configured".to_string())
        })
    }

    fn require_service_account(&self) -> Result<&str> {
        self.auth.service_account_email.as_deref().ok_or_else(|| {
            StewardError::Config("service_account_email is not configured".to_string())
        })
    }
}

/// Binds a provider to one fixed scope/subject/audience so the call
/// executor can pull and refresh credentials without knowing the binding.
pub struct ScopedCredentials {
    provider: Arc<CredentialProvider>,
    scopes: Vec<String>,
    subject: Option<String>,
    audience: Option<String>,
}

impl ScopedCredentials {
    #[must_use]
    pub fn new(
        provider: Arc<CredentialProvider>,
        scopes: Vec<String>,
        subject: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self { provider, scopes, subject, audience }
    }
}

#[async_trait]
impl CredentialSource for ScopedCredentials {
    async fn credential(&self) -> Result<Credential> {
        self.provider
            .get_credential(&self.scopes, self.subject.as_deref(), self.audience.as_deref())
            .await
    }

    async fn refresh(&self) -> Result<Credential> {
        self.provider
            .refresh(&self.scopes, self.subject.as_deref(), self.audience.as_deref())
            .await
    }
}
