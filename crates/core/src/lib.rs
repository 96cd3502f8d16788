//! Core subsystems for Steward
//!
//! The three pieces that make the CLI usable at administrator scale:
//!
//! - [`api`]: single-call execution with per-call error disposition,
//!   bounded retries, and multi-page accumulation.
//! - [`auth`]: credential acquisition and refresh over a pluggable signer.
//! - [`batch`]: the generational worker pool with `commit-batch` barriers.
//!
//! Everything here is written against ports (async traits); the adapters
//! that talk to the network, the filesystem, and hardware live in
//! `steward-infra`.

pub mod api;
pub mod auth;
pub mod batch;

pub use api::{ApiCallExecutor, ApiRequest, ApiResponse, ApiTransport, CallPolicy, HttpMethod};
pub use auth::{Credential, CredentialProvider, Signer, TokenEndpoint, TokenStore};
pub use batch::{BatchReport, BatchScheduler, InvocationOutcome, InvocationRunner, OutcomeKind};
