//! Tool system for the agent.
//!
//! Tools are the "hands and eyes" of the agent - they let the model look at
//! the sandbox screen, drive the pointer and keyboard, run shell commands,
//! and open URLs. Every tool operates on the active [`DesktopSession`];
//! invoking any tool without a session is a precondition failure and causes
//! no remote side effect.

mod browser;
mod desktop;
mod terminal;

pub use browser::OpenUrl;
pub use desktop::{Click, DoubleClick, Hotkey, MoveMouse, Screenshot, Scroll, TypeText};
pub use terminal::RunCommand;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::sandbox::{DesktopSession, SandboxError};

/// Error from tool dispatch or execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A tool was invoked before a session was created.
    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's schema. Checked before any remote call.
    #[error("Invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Parse tool arguments against a typed schema.
///
/// Wrong types and missing required fields fail here, before the side effect.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait DesktopTool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool against the active session.
    async fn execute(&self, args: Value, session: &dyn DesktopSession)
        -> Result<Value, ToolError>;
}

/// Registry of available tools.
///
/// The tool set is fixed and shared read-only across iterations; the session
/// handle is threaded in per call rather than stored here.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn DesktopTool>>,
}

impl ToolRegistry {
    /// Create a new registry with the full desktop tool set.
    pub fn new() -> Self {
        let mut tools: HashMap<String, Arc<dyn DesktopTool>> = HashMap::new();

        // Observation
        tools.insert("screenshot".to_string(), Arc::new(desktop::Screenshot));

        // Pointer
        tools.insert("click".to_string(), Arc::new(desktop::Click));
        tools.insert("double_click".to_string(), Arc::new(desktop::DoubleClick));
        tools.insert("move_mouse".to_string(), Arc::new(desktop::MoveMouse));
        tools.insert("scroll".to_string(), Arc::new(desktop::Scroll));

        // Keyboard
        tools.insert("type".to_string(), Arc::new(desktop::TypeText));
        tools.insert("hotkey".to_string(), Arc::new(desktop::Hotkey));

        // Shell and browser
        tools.insert("run_command".to_string(), Arc::new(terminal::RunCommand));
        tools.insert("open_url".to_string(), Arc::new(browser::OpenUrl));

        tracing::debug!(count = tools.len(), "Tool registry built");
        Self { tools }
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool schemas in LLM-compatible format.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name against the active session.
    ///
    /// `session` is `None` before provisioning and after teardown; every tool
    /// fails with [`ToolError::SessionNotInitialized`] in that window.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        session: Option<&dyn DesktopSession>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let session = session.ok_or(ToolError::SessionNotInitialized)?;

        tool.execute(args, session).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::FakeSession;
    use super::*;

    const ALL_TOOLS: &[&str] = &[
        "screenshot",
        "click",
        "double_click",
        "move_mouse",
        "scroll",
        "type",
        "hotkey",
        "run_command",
        "open_url",
    ];

    #[test]
    fn test_registry_has_fixed_tool_set() {
        let registry = ToolRegistry::new();
        for name in ALL_TOOLS {
            assert!(registry.has_tool(name), "missing tool {}", name);
        }
        assert_eq!(registry.list_tools().len(), ALL_TOOLS.len());
        assert_eq!(registry.definitions().len(), ALL_TOOLS.len());
    }

    #[tokio::test]
    async fn test_every_tool_requires_session() {
        let registry = ToolRegistry::new();
        for name in ALL_TOOLS {
            let result = registry.execute(name, json!({}), None).await;
            assert!(
                matches!(result, Err(ToolError::SessionNotInitialized)),
                "tool {} did not report missing session",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_missing_session_causes_no_remote_call() {
        let registry = ToolRegistry::new();
        let session = FakeSession::new();
        for name in ALL_TOOLS {
            let _ = registry.execute(name, json!({}), None).await;
        }
        assert!(session.calls().is_empty());
        assert_eq!(session.kills(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let session = FakeSession::new();
        let result = registry
            .execute("teleport", json!({}), Some(&session as &dyn crate::sandbox::DesktopSession))
            .await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }
}
