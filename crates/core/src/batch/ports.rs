//! Execution port for batch invocations
//!
//! The scheduler never executes an invocation itself; it hands each one to
//! an [`InvocationRunner`]. The production runner launches an OS child
//! process per invocation so every item gets its own memory and its own
//! credential and discovery caches.

use async_trait::async_trait;
use steward_domain::Invocation;

/// Terminal status of one executed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The invocation completed successfully.
    Success,
    /// The invocation hit a tolerated condition and was skipped.
    SoftError,
    /// The invocation failed.
    Fatal,
}

/// Result of running one invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub invocation: Invocation,
    pub kind: OutcomeKind,
    /// Human-readable detail (error message, exit status).
    pub detail: Option<String>,
}

impl InvocationOutcome {
    #[must_use]
    pub fn success(invocation: Invocation) -> Self {
        Self { invocation, kind: OutcomeKind::Success, detail: None }
    }

    #[must_use]
    pub fn soft(invocation: Invocation, detail: impl Into<String>) -> Self {
        Self { invocation, kind: OutcomeKind::SoftError, detail: Some(detail.into()) }
    }

    #[must_use]
    pub fn fatal(invocation: Invocation, detail: impl Into<String>) -> Self {
        Self { invocation, kind: OutcomeKind::Fatal, detail: Some(detail.into()) }
    }
}

/// Runs a single invocation to completion.
///
/// Implementations must be infallible at the call boundary: execution
/// failures are reported through the outcome, never as a panic or a
/// transport-level error that would abort the surrounding batch.
#[async_trait]
pub trait InvocationRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> InvocationOutcome;
}
