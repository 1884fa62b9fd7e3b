//! Screen, pointer, and keyboard tools.
//!
//! Coordinates are pixels from the top-left corner of the sandbox screen.
//! None of these tools validate coordinates against the actual resolution:
//! out-of-range values are forwarded unmodified and the sandbox decides what
//! they mean.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, DesktopTool, ToolError};
use crate::sandbox::{DesktopSession, MouseButton};

/// Capture the sandbox screen.
pub struct Screenshot;

#[async_trait]
impl DesktopTool for Screenshot {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn description(&self) -> &str {
        "Take a screenshot of the current screen and return it as base64-encoded PNG."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        _args: Value,
        session: &dyn DesktopSession,
    ) -> Result<Value, ToolError> {
        tracing::info!("Taking screenshot");
        let png = session.screenshot().await?;
        Ok(json!({
            "success": true,
            "data": base64::engine::general_purpose::STANDARD.encode(&png),
            "mime_type": "image/png",
        }))
    }
}

#[derive(Deserialize)]
struct ClickArgs {
    x: i64,
    y: i64,
    #[serde(default)]
    button: MouseButton,
}

/// Click at a position.
pub struct Click;

#[async_trait]
impl DesktopTool for Click {
    fn name(&self) -> &str {
        "click"
    }

    fn description(&self) -> &str {
        "Click at a specific position on the screen. Supports left, right, and middle buttons. Coordinates are pixels from the top-left corner (0,0)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": {
                    "type": "integer",
                    "description": "X coordinate in pixels from the left edge"
                },
                "y": {
                    "type": "integer",
                    "description": "Y coordinate in pixels from the top edge"
                },
                "button": {
                    "type": "string",
                    "enum": ["left", "right", "middle"],
                    "description": "Mouse button to click (default: 'left')"
                }
            },
            "required": ["x", "y"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: ClickArgs = parse_args(self.name(), args)?;
        tracing::info!(x = args.x, y = args.y, button = args.button.as_str(), "Clicking");
        session.click(args.x, args.y, args.button).await?;
        Ok(json!({
            "success": true,
            "description": format!("{} click at ({}, {})", args.button.as_str(), args.x, args.y),
        }))
    }
}

#[derive(Deserialize)]
struct PositionArgs {
    x: i64,
    y: i64,
}

/// Double-click at a position.
pub struct DoubleClick;

#[async_trait]
impl DesktopTool for DoubleClick {
    fn name(&self) -> &str {
        "double_click"
    }

    fn description(&self) -> &str {
        "Double-click at a specific position on the screen (left button)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": {
                    "type": "integer",
                    "description": "X coordinate in pixels from the left edge"
                },
                "y": {
                    "type": "integer",
                    "description": "Y coordinate in pixels from the top edge"
                }
            },
            "required": ["x", "y"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: PositionArgs = parse_args(self.name(), args)?;
        tracing::info!(x = args.x, y = args.y, "Double-clicking");
        session.double_click(args.x, args.y).await?;
        Ok(json!({
            "success": true,
            "description": format!("double click at ({}, {})", args.x, args.y),
        }))
    }
}

/// Move the mouse without clicking.
pub struct MoveMouse;

#[async_trait]
impl DesktopTool for MoveMouse {
    fn name(&self) -> &str {
        "move_mouse"
    }

    fn description(&self) -> &str {
        "Move the mouse cursor to a specific position without clicking. Useful for hover effects."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": {
                    "type": "integer",
                    "description": "X coordinate in pixels from the left edge"
                },
                "y": {
                    "type": "integer",
                    "description": "Y coordinate in pixels from the top edge"
                }
            },
            "required": ["x", "y"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: PositionArgs = parse_args(self.name(), args)?;
        tracing::info!(x = args.x, y = args.y, "Moving mouse");
        session.move_mouse(args.x, args.y).await?;
        Ok(json!({
            "success": true,
            "description": format!("moved mouse to ({}, {})", args.x, args.y),
        }))
    }
}

#[derive(Deserialize)]
struct TypeArgs {
    text: String,
}

/// Type text into the focused window.
pub struct TypeText;

#[async_trait]
impl DesktopTool for TypeText {
    fn name(&self) -> &str {
        "type"
    }

    fn description(&self) -> &str {
        "Type text into the currently focused window."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to type"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: TypeArgs = parse_args(self.name(), args)?;
        tracing::info!(chars = args.text.len(), "Typing text");
        session.write(&args.text).await?;
        Ok(json!({
            "success": true,
            "description": format!("typed {} characters", args.text.chars().count()),
        }))
    }
}

#[derive(Deserialize)]
struct HotkeyArgs {
    keys: String,
}

/// Press a key combination.
pub struct Hotkey;

#[async_trait]
impl DesktopTool for Hotkey {
    fn name(&self) -> &str {
        "hotkey"
    }

    fn description(&self) -> &str {
        "Press a key combination, e.g. 'Return', 'ctrl+a', 'alt+F4', 'ctrl+shift+t'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keys": {
                    "type": "string",
                    "description": "The key combination to press (e.g. 'ctrl+c')"
                }
            },
            "required": ["keys"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: HotkeyArgs = parse_args(self.name(), args)?;
        tracing::info!(keys = %args.keys, "Pressing hotkey");
        session.hotkey(&args.keys).await?;
        Ok(json!({
            "success": true,
            "description": format!("pressed {}", args.keys),
        }))
    }
}

/// Scroll direction as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScrollDirection {
    Up,
    Down,
}

#[derive(Deserialize)]
struct ScrollArgs {
    x: i64,
    y: i64,
    direction: ScrollDirection,
    #[serde(default = "default_scroll_amount")]
    amount: i64,
}

fn default_scroll_amount() -> i64 {
    3
}

/// Scroll the mouse wheel at a position.
pub struct Scroll;

#[async_trait]
impl DesktopTool for Scroll {
    fn name(&self) -> &str {
        "scroll"
    }

    fn description(&self) -> &str {
        "Scroll the mouse wheel at a specific position. Direction is 'up' or 'down'; amount is the number of wheel clicks (default 3)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": {
                    "type": "integer",
                    "description": "X coordinate to scroll at"
                },
                "y": {
                    "type": "integer",
                    "description": "Y coordinate to scroll at"
                },
                "direction": {
                    "type": "string",
                    "enum": ["up", "down"],
                    "description": "Scroll direction"
                },
                "amount": {
                    "type": "integer",
                    "description": "Number of wheel clicks (default: 3)"
                }
            },
            "required": ["x", "y", "direction"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: ScrollArgs = parse_args(self.name(), args)?;
        if args.amount <= 0 {
            return Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: format!("amount must be positive, got {}", args.amount),
            });
        }

        // The sandbox takes a signed amount: up is negative, down is positive.
        let signed = match args.direction {
            ScrollDirection::Up => -args.amount,
            ScrollDirection::Down => args.amount,
        };

        tracing::info!(x = args.x, y = args.y, amount = signed, "Scrolling");
        session.scroll(args.x, args.y, signed).await?;
        Ok(json!({
            "success": true,
            "description": format!(
                "scrolled {} by {} at ({}, {})",
                match args.direction {
                    ScrollDirection::Up => "up",
                    ScrollDirection::Down => "down",
                },
                args.amount,
                args.x,
                args.y
            ),
        }))
    }
}
