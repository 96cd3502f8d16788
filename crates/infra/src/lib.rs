//! Infrastructure adapters for Steward
//!
//! Implementations of the `steward-core` ports that touch the outside
//! world: the REST transport, the token-store file, the OAuth token
//! endpoint, software and hardware signers, the per-invocation process
//! runner, and the configuration loader.

pub mod auth;
pub mod batch;
pub mod config;
pub mod http;

pub use auth::{DeviceLock, FileTokenStore, HttpTokenEndpoint, SoftwareSigner};
pub use batch::ProcessRunner;
pub use http::RestTransport;
