//! Domain types for Steward
//!
//! Pure types shared by every layer: the error taxonomy, the closed API
//! reason-code vocabulary, the batch invocation model, and the immutable
//! application configuration. No I/O and no async code lives here.

pub mod config;
pub mod errors;
pub mod invocation;
pub mod reason;

pub use config::{ApiConfig, AuthConfig, BatchConfig, Config, KeySource};
pub use errors::{Result, StewardError, EXIT_CODE_SOFT};
pub use invocation::{Invocation, BATCH_BARRIER};
pub use reason::ApiReason;
