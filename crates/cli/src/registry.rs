//! Static command registry
//!
//! One name-to-handler map, built once. Worker processes re-enter through
//! the same map, so a batch line and an interactive command always resolve
//! to identical behavior.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use once_cell::sync::Lazy;
use steward_domain::{Result, StewardError};

use crate::commands::{self, CommandContext, CommandStatus};

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandStatus>> + Send + 'a>>;
type Handler = for<'a> fn(&'a CommandContext, &'a [String]) -> HandlerFuture<'a>;

fn user_handler<'a>(ctx: &'a CommandContext, args: &'a [String]) -> HandlerFuture<'a> {
    Box::pin(commands::user::run(ctx, args))
}

fn group_handler<'a>(ctx: &'a CommandContext, args: &'a [String]) -> HandlerFuture<'a> {
    Box::pin(commands::group::run(ctx, args))
}

static REGISTRY: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Handler> = HashMap::new();
    map.insert("user", user_handler);
    map.insert("group", group_handler);
    map
});

/// Run one command invocation against the registry.
///
/// # Errors
/// Returns `StewardError::InvalidInput` for an empty or unknown command;
/// otherwise whatever the handler returns.
pub async fn dispatch(ctx: &CommandContext, tokens: &[String]) -> Result<CommandStatus> {
    let Some((name, args)) = tokens.split_first() else {
        return Err(StewardError::InvalidInput("empty command".to_string()));
    };
    let handler = REGISTRY.get(name.as_str()).ok_or_else(|| {
        StewardError::InvalidInput(format!(
            "unknown command {name:?}; known commands: {}",
            known_commands().join(", ")
        ))
    })?;
    handler(ctx, args).await
}

fn known_commands() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_expected_commands() {
        assert_eq!(known_commands(), vec!["group", "user"]);
    }
}
