//! Directory group commands

use serde_json::Value;
use steward_core::api::{ApiRequest, CallPolicy};
use steward_domain::Result;

use super::{print_json, usage, CommandContext, CommandStatus, TRANSIENT};

const GROUPS_PATH: &str = "admin/directory/v1/groups";

pub async fn run(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    match args.split_first().map(|(action, rest)| (action.as_str(), rest)) {
        Some(("get", rest)) => get(ctx, rest).await,
        Some(("list", rest)) => list(ctx, rest).await,
        Some(("members", rest)) => members(ctx, rest).await,
        _ => Err(usage("usage: group <get|list|members> ...")),
    }
}

async fn get(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let [email] = args else { return Err(usage("usage: group get <email>")) };

    let request = ApiRequest::get(format!("{GROUPS_PATH}/{email}"));
    let policy = CallPolicy { retry: TRANSIENT, ..CallPolicy::default() };

    if let Some(body) = ctx.executor.call(&request, &policy).await? {
        print_json(&body)?;
    }
    Ok(CommandStatus::Clean)
}

async fn list(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let mut request = ApiRequest::get(GROUPS_PATH)
        .with_query("maxResults", ctx.config.api.page_size.to_string());
    match args {
        [] => request = request.with_query("customer", "my_customer"),
        [domain] => request = request.with_query("domain", domain),
        _ => return Err(usage("usage: group list [domain]")),
    }

    let policy = CallPolicy { retry: TRANSIENT, ..CallPolicy::default() };
    let groups = ctx
        .executor
        .get_all_pages(request, "groups", &policy, Some("retrieving groups"))
        .await?;

    print_json(&Value::Array(groups))?;
    Ok(CommandStatus::Clean)
}

async fn members(ctx: &CommandContext, args: &[String]) -> Result<CommandStatus> {
    let [email] = args else { return Err(usage("usage: group members <email>")) };

    let request = ApiRequest::get(format!("{GROUPS_PATH}/{email}/members"))
        .with_query("maxResults", ctx.config.api.page_size.to_string());
    let policy = CallPolicy { retry: TRANSIENT, ..CallPolicy::default() };

    let members = ctx
        .executor
        .get_all_pages(request, "members", &policy, Some("retrieving members"))
        .await?;

    print_json(&Value::Array(members))?;
    Ok(CommandStatus::Clean)
}
