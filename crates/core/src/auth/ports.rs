//! Traits for signing, token storage, and grant exchange
//!
//! These traits abstract the external dependencies of credential handling
//! (key material, the token-store file, the OAuth token endpoint) so the
//! provider logic is testable and backends are interchangeable.

use async_trait::async_trait;
use steward_domain::Result;

use super::types::{Credential, StoredToken, TokenGrantResponse};

/// Produces a cryptographic signature over a byte payload.
///
/// The two implementations, software RSA key and hardware PIV device, are
/// behaviorally identical to callers. Any backend that can sign bytes
/// and report a stable key identifier plugs in here.
pub trait Signer: Send + Sync {
    /// Sign the message, returning raw signature bytes.
    ///
    /// # Errors
    /// Returns `StewardError::Signer` when key material is unusable or the
    /// device fails.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Stable identifier of the signing key (key id, or device slot/serial).
    fn key_id(&self) -> &str;
}

/// Access to the stored-user-token file.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored token.
    ///
    /// # Errors
    /// Returns `StewardError::InvalidCredentialsFile` when the store is
    /// absent or unreadable.
    async fn load(&self) -> Result<StoredToken>;

    /// Persist the stored token.
    async fn save(&self, token: &StoredToken) -> Result<()>;
}

/// A grant to exchange at the token endpoint.
#[derive(Debug, Clone)]
pub enum GrantRequest<'a> {
    /// Standard refresh-token grant for a stored user credential.
    RefreshToken {
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
    /// Signed JWT assertion for a service identity (domain-wide delegation).
    JwtBearer { assertion: &'a str },
}

/// The OAuth token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a grant for an access token.
    ///
    /// # Errors
    /// Rejections surface as `StewardError::Api` with reason
    /// `invalid_grant` (or `auth_error`), never as a retry loop.
    async fn exchange(&self, grant: GrantRequest<'_>) -> Result<TokenGrantResponse>;
}

/// Supplies the executor with a credential for one fixed scope/subject
/// binding, plus the single refresh it is allowed on an authorization
/// rejection.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credential(&self) -> Result<Credential>;

    async fn refresh(&self) -> Result<Credential>;
}
