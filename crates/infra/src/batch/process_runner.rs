//! Per-invocation OS process runner
//!
//! Every batch invocation runs as a child process of the current
//! executable: its own memory, its own credential and discovery caches,
//! its own crash domain. Children get their own process group so a
//! terminal interrupt aimed at the batch driver does not kill a worker
//! mid-mutation.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use steward_core::batch::{InvocationOutcome, InvocationRunner};
use steward_domain::{Invocation, Result, StewardError, EXIT_CODE_SOFT};
use tokio::process::Command;
use tracing::debug;

pub struct ProcessRunner {
    program: PathBuf,
    base_args: Vec<String>,
}

impl ProcessRunner {
    /// Runner that re-invokes the current executable per invocation.
    ///
    /// # Errors
    /// Returns `StewardError::Internal` when the current executable path
    /// cannot be determined.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| {
            StewardError::Internal(format!("cannot determine current executable: {e}"))
        })?;
        Ok(Self { program, base_args: Vec::new() })
    }

    /// Runner for an arbitrary program, mainly for tests.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self { program: program.into(), base_args }
    }
}

#[async_trait]
impl InvocationRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> InvocationOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(invocation.tokens())
            .stdin(Stdio::null())
            .kill_on_drop(false);

        // Own process group: terminal signals stay with the driver.
        #[cfg(unix)]
        command.process_group(0);

        debug!(invocation = %invocation, "spawning worker process");

        match command.status().await {
            Ok(status) => match status.code() {
                Some(0) => InvocationOutcome::success(invocation.clone()),
                Some(EXIT_CODE_SOFT) => InvocationOutcome::soft(
                    invocation.clone(),
                    format!("worker exited with soft-error code {EXIT_CODE_SOFT}"),
                ),
                Some(code) => InvocationOutcome::fatal(
                    invocation.clone(),
                    format!("worker exited with code {code}"),
                ),
                None => {
                    InvocationOutcome::fatal(invocation.clone(), "worker terminated by signal")
                }
            },
            Err(e) => InvocationOutcome::fatal(
                invocation.clone(),
                format!("failed to launch worker: {e}"),
            ),
        }
    }
}
