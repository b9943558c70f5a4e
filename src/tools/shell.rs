//! Shell tool

use std::time::Duration;

use serde_json::json;

use super::{ToolContext, handler_fn};
use crate::{
    error::ToolResult,
    model::{ArgValue, Arguments, ToolOutput},
    registry::{ParamSpec, SideEffect, ToolSpec},
};

/// Longest per-command timeout a client may request, in seconds
pub const MAX_COMMAND_TIMEOUT_SECS: i64 = 300;

pub(super) fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "run_shell_command",
            "Run a non-interactive shell command and return its stdout, stderr and exit code. \
             A non-zero exit code is still a successful call. Avoid destructive or \
             long-running commands.",
            SideEffect::ProcessSpawn,
            handler_fn(run_shell_command),
        )
        .param(ParamSpec::string("command", "Shell command line").non_empty())
        .param(
            ParamSpec::integer("timeout", "Maximum runtime in seconds")
                .range(1.0, MAX_COMMAND_TIMEOUT_SECS as f64)
                .default(ArgValue::Int(30)),
        ),
    ]
}

async fn run_shell_command(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let command = args.str("command")?;
    // Validation bounds timeout to 1..=300.
    let timeout = Duration::from_secs(args.int("timeout")?.unsigned_abs());

    let output = ctx.providers.shell.run_command(command, timeout).await?;
    Ok(ToolOutput::Json(json!({
        "success": true,
        "stdout": output.stdout,
        "stderr": output.stderr,
        "return_code": output.exit_code,
    })))
}
