//! Batch execution: segment splitting, worker pools, per-item outcomes

mod ports;
mod scheduler;

pub use ports::{InvocationOutcome, InvocationRunner, OutcomeKind};
pub use scheduler::{BatchReport, BatchScheduler};
