//! Directory user commands

use serde_json::Value;
use steward_core::api::{ApiRequest, CallPolicy};
use steward_domain::{ApiReason, Result};
use tracing::warn;

use super::{print_json, usage, CommandContext, CommandStatus, TRANSIENT};

const USERS_PATH: &str = "admin/directory/v1/users";

pub async fn run(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    match args.split_first().map(|(action, rest)| (action.as_str(), rest)) {
        Some(("get", rest)) => get(ctx, rest).await,
        Some(("list", rest)) => list(ctx, rest).await,
        Some(("delete", rest)) => delete(ctx, rest).await,
        _ => Err(usage("usage: user <get|list|delete> ...")),
    }
}

async fn get(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let [email] = args else { return Err(usage("usage: user get <email>")) };

    let request = ApiRequest::get(format!("{USERS_PATH}/{email}"));
    let policy = CallPolicy { retry: TRANSIENT, ..CallPolicy::default() };

    if let Some(body) = ctx.executor.call(&request, &policy).await? {
        print_json(&body)?;
    }
    Ok(CommandStatus::Clean)
}

async fn list(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let mut request = ApiRequest::get(USERS_PATH)
        .with_query("maxResults", ctx.config.api.page_size.to_string());
    match args {
        [] => request = request.with_query("customer", "my_customer"),
        [domain] => request = request.with_query("domain", domain),
        _ => return Err(usage("usage: user list [domain]")),
    }

    let policy = CallPolicy { retry: TRANSIENT, ..CallPolicy::default() };
    let users = ctx
        .executor
        .get_all_pages(request, "users", &policy, Some("retrieving users"))
        .await?;

    print_json(&Value::Array(users))?;
    Ok(CommandStatus::Clean)
}

async fn delete(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let [email] = args else { return Err(usage("usage: user delete <email>")) };

    let mut request = ApiRequest::get(format!("{USERS_PATH}/{email}"));
    request.method = steward_core::api::HttpMethod::Delete;

    // A user that is already gone is the desired end state.
    let policy = CallPolicy {
        soft: &[ApiReason::NotFound],
        retry: TRANSIENT,
        ..CallPolicy::default()
    };

    match ctx.executor.call(&request, &policy).await? {
        Some(_) => Ok(CommandStatus::Clean),
        None => {
            warn!(email = %email, "user absent, delete skipped");
            Ok(CommandStatus::SoftErrors)
        }
    }
}
