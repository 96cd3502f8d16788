//! Command handlers
//!
//! Each top-level command word maps to a handler working against one
//! shared [`CommandContext`]. Handlers report whether any item was
//! soft-skipped so the process can exit with the soft-error code that the
//! batch scheduler understands.

pub mod group;
pub mod user;

use steward_core::api::ApiCallExecutor;
use steward_domain::{ApiReason, Config, Result, StewardError};

/// Scopes requested for directory administration.
pub const DIRECTORY_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/admin.directory.user",
    "https://www.googleapis.com/auth/admin.directory.group",
];

/// Reasons worth a backoff-and-retry on read/list traffic.
pub const TRANSIENT: &[ApiReason] = &[
    ApiReason::RateLimited,
    ApiReason::QuotaExceeded,
    ApiReason::ServiceUnavailable,
    ApiReason::BackendError,
];

/// How a handler finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// All items succeeded.
    Clean,
    /// At least one item was soft-skipped; nothing failed.
    SoftErrors,
}

/// Everything a handler needs: the immutable configuration and a wired
/// call executor.
pub struct CommandContext {
    pub config: Config,
    pub executor: ApiCallExecutor,
}

pub(crate) fn usage(message: &str) -> StewardError {
    StewardError::InvalidInput(message.to_string())
}

#[allow(clippy::print_stdout)]
pub(crate) fn print_json(value: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| StewardError::Internal(format!("cannot render response: {e}")))?;
    println!("{rendered}");
    Ok(())
}
