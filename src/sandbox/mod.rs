//! Remote desktop sandbox interface.
//!
//! The sandbox is an externally provisioned virtual machine with a screen,
//! reachable over HTTP. This module defines the session contract the rest of
//! the crate programs against; [`e2b`] holds the real client. The traits are
//! the seam test doubles plug into.

mod e2b;

pub use e2b::E2bClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error from the desktop sandbox provider.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Sandbox request failed: {0}")]
    Network(String),

    #[error("Sandbox API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse sandbox response: {0}")]
    Parse(String),
}

/// Screen resolution and DPI for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Screen size in pixels (width, height)
    pub resolution: (u32, u32),
    /// Screen DPI
    pub dpi: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resolution: (1280, 720),
            dpi: 96,
        }
    }
}

impl SessionConfig {
    /// Parse a `WIDTHxHEIGHT` string like `1280x720`.
    pub fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|e| format!("invalid width '{}': {}", w, e))?;
        let height = h
            .trim()
            .parse()
            .map_err(|e| format!("invalid height '{}': {}", h, e))?;
        Ok((width, height))
    }
}

/// Mouse button for click operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        Self::Left
    }
}

impl MouseButton {
    /// Wire name used by the sandbox API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

/// Result of running a shell command inside the sandbox.
///
/// A non-zero exit code is a normal result, not an error: the command ran,
/// it just failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

/// An active remote desktop session.
///
/// Coordinates are pixels from the top-left corner. No implementation clamps
/// them against the actual screen size; out-of-range values are forwarded
/// uninterpreted and the sandbox decides what they mean.
#[async_trait]
pub trait DesktopSession: Send + Sync {
    /// URL of the live streaming view of the desktop.
    fn stream_url(&self) -> &str;

    /// Capture the current screen as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, SandboxError>;

    /// Click at the given position.
    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), SandboxError>;

    /// Double-click at the given position (left button).
    async fn double_click(&self, x: i64, y: i64) -> Result<(), SandboxError>;

    /// Move the pointer without clicking.
    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), SandboxError>;

    /// Type text into the focused window.
    async fn write(&self, text: &str) -> Result<(), SandboxError>;

    /// Press a key combination, e.g. `ctrl+c` or `alt+F4`.
    async fn hotkey(&self, keys: &str) -> Result<(), SandboxError>;

    /// Scroll at the given position. Negative amount scrolls up, positive down.
    async fn scroll(&self, x: i64, y: i64, amount: i64) -> Result<(), SandboxError>;

    /// Run a shell command inside the sandbox. Unrestricted: the sandbox VM
    /// itself is the isolation boundary.
    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError>;

    /// Open a URL in the sandbox's default browser.
    async fn open_url(&self, url: &str) -> Result<(), SandboxError>;

    /// Terminate the session and release the VM.
    async fn kill(&self) -> Result<(), SandboxError>;
}

/// Provisions new desktop sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create(&self, config: &SessionConfig) -> Result<Box<dyn DesktopSession>, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(SessionConfig::parse_resolution("1280x720"), Ok((1280, 720)));
        assert_eq!(SessionConfig::parse_resolution("1920x1080"), Ok((1920, 1080)));
        assert!(SessionConfig::parse_resolution("1280").is_err());
        assert!(SessionConfig::parse_resolution("widexhigh").is_err());
    }

    #[test]
    fn test_mouse_button_wire_names() {
        assert_eq!(MouseButton::Left.as_str(), "left");
        assert_eq!(MouseButton::Right.as_str(), "right");
        assert_eq!(MouseButton::Middle.as_str(), "middle");
        assert_eq!(MouseButton::default(), MouseButton::Left);
    }
}
