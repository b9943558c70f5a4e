//! Keyboard tools

use std::time::Duration;

use serde_json::json;

use super::{ToolContext, action_ok, handler_fn};
use crate::{
    error::ToolResult,
    model::{ArgValue, Arguments, ToolOutput},
    registry::{ParamSpec, SideEffect, ToolSpec},
};

/// Delay before the previous clipboard text is put back after a paste
pub const CLIPBOARD_RESTORE_DELAY: Duration = Duration::from_millis(400);

#[cfg(target_os = "macos")]
const PASTE_CHORD: [&str; 2] = ["cmd", "v"];
#[cfg(not(target_os = "macos"))]
const PASTE_CHORD: [&str; 2] = ["ctrl", "v"];

const KEY_NAMES_HELP: &str = "Key name, case-insensitive: 'enter', 'tab', 'esc', 'backspace', \
                              'up', 'pagedown', 'f5', 'ctrl', 'shift', 'alt', 'cmd', a letter \
                              or digit";

fn key_param() -> ParamSpec {
    ParamSpec::string("key", KEY_NAMES_HELP).non_empty()
}

pub(super) fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "keyboard_type",
            "Type text at the current focus. By default the text is pasted through the \
             clipboard, which handles any Unicode; set use_clipboard=false to send individual \
             keystrokes without touching the clipboard.",
            SideEffect::InputInjection,
            handler_fn(keyboard_type),
        )
        .param(ParamSpec::string("text", "The text to type"))
        .param(
            ParamSpec::boolean("use_clipboard", "Paste through the clipboard")
                .default(ArgValue::Bool(true)),
        ),
        ToolSpec::new(
            "keyboard_press",
            "Press and release a single key.",
            SideEffect::InputInjection,
            handler_fn(keyboard_press),
        )
        .param(key_param()),
        ToolSpec::new(
            "keyboard_hotkey",
            "Press a keyboard shortcut: keys are pressed in order and released in reverse, \
             e.g. [\"ctrl\", \"c\"] or [\"ctrl\", \"shift\", \"t\"].",
            SideEffect::InputInjection,
            handler_fn(keyboard_hotkey),
        )
        .param(ParamSpec::string_array("keys", "Ordered key names to hold together").non_empty()),
        ToolSpec::new(
            "keyboard_key_down",
            "Hold a key down without releasing it. Pair with keyboard_key_up.",
            SideEffect::InputInjection,
            handler_fn(keyboard_key_down),
        )
        .param(key_param()),
        ToolSpec::new(
            "keyboard_key_up",
            "Release a key held with keyboard_key_down.",
            SideEffect::InputInjection,
            handler_fn(keyboard_key_up),
        )
        .param(key_param()),
    ]
}

async fn keyboard_type(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let text = args.str("text")?;

    if args.bool("use_clipboard")? {
        let clipboard = ctx.providers.clipboard.clone();
        let previous = clipboard.get_text().await.ok();
        clipboard.set_text(text).await?;

        // Restore is scheduled before pasting so a failed paste still restores.
        if let Some(previous) = previous {
            tokio::spawn(async move {
                tokio::time::sleep(CLIPBOARD_RESTORE_DELAY).await;
                if let Err(e) = clipboard.set_text(&previous).await {
                    tracing::debug!("Clipboard restore failed: {}", e);
                }
            });
        }

        let chord: Vec<String> = PASTE_CHORD.iter().map(|k| k.to_string()).collect();
        ctx.providers.input.hotkey(&chord).await?;
    } else {
        ctx.providers.input.type_text(text).await?;
    }

    Ok(action_ok("type", json!({ "text": text })))
}

async fn keyboard_press(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let key = args.str("key")?;
    ctx.providers.input.press_key(key).await?;
    Ok(action_ok("press", json!({ "key": key })))
}

async fn keyboard_hotkey(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let keys = args.str_list("keys")?;
    ctx.providers.input.hotkey(&keys).await?;
    Ok(action_ok("hotkey", json!({ "keys": keys })))
}

async fn keyboard_key_down(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let key = args.str("key")?;
    ctx.providers.input.key_down(key).await?;
    Ok(action_ok("key_down", json!({ "key": key })))
}

async fn keyboard_key_up(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let key = args.str("key")?;
    ctx.providers.input.key_up(key).await?;
    Ok(action_ok("key_up", json!({ "key": key })))
}
