//! Batch invocation model
//!
//! An invocation is one command to execute: an ordered, immutable sequence of
//! string tokens. The literal token `commit-batch`, standing alone, is not a
//! command but a barrier marker: the scheduler drains all prior work before
//! anything after it starts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StewardError};

/// Sentinel item marking a synchronization barrier in a batch.
pub const BATCH_BARRIER: &str = "commit-batch";

/// One command invocation: an ordered token sequence, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    tokens: Vec<String>,
}

impl Invocation {
    /// Build an invocation from its tokens.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an empty token list.
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(StewardError::InvalidInput("empty invocation".into()));
        }
        Ok(Self { tokens })
    }

    /// The barrier marker item.
    #[must_use]
    pub fn barrier() -> Self {
        Self { tokens: vec![BATCH_BARRIER.to_string()] }
    }

    /// Ordered command tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// True when this item is the `commit-batch` barrier rather than a
    /// command.
    #[must_use]
    pub fn is_barrier(&self) -> bool {
        self.tokens.len() == 1 && self.tokens[0] == BATCH_BARRIER
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_token_list() {
        let result = Invocation::new(vec![]);
        assert!(matches!(result, Err(StewardError::InvalidInput(_))));
    }

    #[test]
    fn recognizes_standalone_barrier() {
        assert!(Invocation::barrier().is_barrier());
        let explicit = Invocation::new(vec![BATCH_BARRIER.to_string()]).unwrap();
        assert!(explicit.is_barrier());
    }

    #[test]
    fn barrier_token_inside_command_is_not_a_barrier() {
        let inv =
            Invocation::new(vec!["user".into(), "rename".into(), BATCH_BARRIER.into()]).unwrap();
        assert!(!inv.is_barrier());
    }

    #[test]
    fn display_joins_tokens() {
        let inv = Invocation::new(vec!["user".into(), "get".into(), "a@example.com".into()])
            .unwrap();
        assert_eq!(inv.to_string(), "user get a@example.com");
    }
}
