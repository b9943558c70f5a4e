//! Mouse tools
//!
//! Coordinates are logical screen coordinates. When working from a
//! screenshot, multiply image coordinates by its `scale_x`/`scale_y` first.

use serde_json::json;

use super::{ToolContext, action_ok, handler_fn};
use crate::{
    error::{ToolError, ToolResult},
    model::{ArgValue, Arguments, ToolOutput},
    providers::MouseButton,
    registry::{ParamSpec, SideEffect, ToolSpec},
};

const SCROLL_LIMIT: f64 = 100.0;

fn coordinate(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec::integer(name, description).min(0.0)
}

fn point_params(spec: ToolSpec) -> ToolSpec {
    spec.param(coordinate("x", "X coordinate on screen (pixels from the left)"))
        .param(coordinate("y", "Y coordinate on screen (pixels from the top)"))
}

pub(super) fn specs() -> Vec<ToolSpec> {
    vec![
        point_params(ToolSpec::new(
            "mouse_move",
            "Move the mouse cursor to (x, y) without clicking.",
            SideEffect::InputInjection,
            handler_fn(mouse_move),
        )),
        point_params(ToolSpec::new(
            "mouse_left_click",
            "Left-click at (x, y).",
            SideEffect::InputInjection,
            handler_fn(mouse_left_click),
        )),
        point_params(ToolSpec::new(
            "mouse_right_click",
            "Right-click at (x, y), usually to open a context menu.",
            SideEffect::InputInjection,
            handler_fn(mouse_right_click),
        )),
        point_params(ToolSpec::new(
            "mouse_double_click",
            "Double-click with the left button at (x, y).",
            SideEffect::InputInjection,
            handler_fn(mouse_double_click),
        )),
        point_params(ToolSpec::new(
            "mouse_scroll",
            "Scroll at (x, y). Positive scroll_y scrolls up, negative scrolls down; positive \
             scroll_x scrolls right, negative scrolls left. Typical amounts are 3 to 10.",
            SideEffect::InputInjection,
            handler_fn(mouse_scroll),
        ))
        .param(
            ParamSpec::integer("scroll_y", "Vertical scroll amount (positive = up)")
                .range(-SCROLL_LIMIT, SCROLL_LIMIT)
                .default(ArgValue::Int(3)),
        )
        .param(
            ParamSpec::integer("scroll_x", "Horizontal scroll amount (positive = right)")
                .range(-SCROLL_LIMIT, SCROLL_LIMIT)
                .default(ArgValue::Int(0)),
        ),
        ToolSpec::new(
            "mouse_drag",
            "Press a mouse button at (start_x, start_y), move to (end_x, end_y) and release. \
             Useful for moving files, resizing windows or selecting text.",
            SideEffect::InputInjection,
            handler_fn(mouse_drag),
        )
        .param(coordinate("start_x", "Starting X coordinate"))
        .param(coordinate("start_y", "Starting Y coordinate"))
        .param(coordinate("end_x", "Ending X coordinate"))
        .param(coordinate("end_y", "Ending Y coordinate"))
        .param(
            ParamSpec::string("button", "Mouse button to hold during the drag")
                .one_of(MouseButton::NAMES)
                .default(ArgValue::Str("left".to_string())),
        ),
    ]
}

fn point(args: &Arguments) -> ToolResult<(i32, i32)> {
    Ok((args.i32("x")?, args.i32("y")?))
}

async fn mouse_move(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let (x, y) = point(&args)?;
    ctx.providers.input.move_cursor(x, y).await?;
    Ok(action_ok("move", json!({ "x": x, "y": y })))
}

async fn click(
    ctx: &ToolContext,
    args: &Arguments,
    action: &str,
    button: MouseButton,
    count: u32,
) -> ToolResult<ToolOutput> {
    let (x, y) = point(args)?;
    ctx.providers.input.click(x, y, button, count).await?;
    Ok(action_ok(action, json!({ "x": x, "y": y })))
}

async fn mouse_left_click(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    click(&ctx, &args, "left_click", MouseButton::Left, 1).await
}

async fn mouse_right_click(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    click(&ctx, &args, "right_click", MouseButton::Right, 1).await
}

async fn mouse_double_click(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    click(&ctx, &args, "double_click", MouseButton::Left, 2).await
}

async fn mouse_scroll(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let (x, y) = point(&args)?;
    let scroll_y = args.i32("scroll_y")?;
    let scroll_x = args.i32("scroll_x")?;
    ctx.providers.input.scroll(x, y, scroll_x, scroll_y).await?;
    Ok(action_ok(
        "scroll",
        json!({ "x": x, "y": y, "scroll_y": scroll_y, "scroll_x": scroll_x }),
    ))
}

async fn mouse_drag(ctx: ToolContext, args: Arguments) -> ToolResult<ToolOutput> {
    let from = (args.i32("start_x")?, args.i32("start_y")?);
    let to = (args.i32("end_x")?, args.i32("end_y")?);
    let button: MouseButton = args
        .str("button")?
        .parse()
        .map_err(|e: String| ToolError::invalid_argument("button", e))?;

    ctx.providers.input.drag(from, to, button).await?;
    Ok(action_ok(
        "drag",
        json!({
            "from": { "x": from.0, "y": from.1 },
            "to": { "x": to.0, "y": to.1 },
            "button": button,
        }),
    ))
}
