//! Credential acquisition and refresh over a pluggable signer

mod jwt;
mod ports;
mod provider;
mod types;

pub use jwt::signed_jwt;
pub use ports::{CredentialSource, GrantRequest, Signer, TokenEndpoint, TokenStore};
pub use provider::{CredentialProvider, ScopedCredentials};
pub use types::{Credential, StoredToken, TokenGrantResponse};
