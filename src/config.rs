//! Configuration management for deskpilot.
//!
//! Configuration is read from environment variables (a local `.env` file is
//! loaded at startup if present):
//! - `E2B_API_KEY` - Required. API key for the desktop sandbox provider.
//! - `OPENROUTER_API_KEY` - Required. API key for the model provider.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `anthropic/claude-sonnet-4.5`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `20`.
//! - `MAX_TOOL_STEPS` - Optional. Tool-dispatch rounds within one iteration. Defaults to `10`.
//! - `DESKTOP_RESOLUTION` - Optional. Sandbox screen size as `WIDTHxHEIGHT`. Defaults to `1280x720`.
//! - `DESKTOP_DPI` - Optional. Sandbox screen DPI. Defaults to `96`.
//! - `COMPLETION_PHRASES` - Optional. Comma-separated phrases that signal task
//!   completion when found in model output. Defaults to `task completed,done,finished`.

use thiserror::Error;

use crate::sandbox::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Desktop sandbox provider API key
    pub sandbox_api_key: String,

    /// Model provider API key
    pub llm_api_key: String,

    /// Model identifier (OpenRouter format)
    pub model: String,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Maximum tool-dispatch rounds within a single iteration
    pub max_tool_steps: usize,

    /// Sandbox screen resolution and DPI
    pub session: SessionConfig,

    /// Phrases that mark the task as complete (case-insensitive substrings)
    pub completion_phrases: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if either API key is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sandbox_api_key = std::env::var("E2B_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("E2B_API_KEY".to_string()))?;

        let llm_api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-sonnet-4.5".to_string());

        let max_iterations = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;

        let max_tool_steps = std::env::var("MAX_TOOL_STEPS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_TOOL_STEPS".to_string(), format!("{}", e))
            })?;

        let resolution =
            std::env::var("DESKTOP_RESOLUTION").unwrap_or_else(|_| "1280x720".to_string());
        let resolution = SessionConfig::parse_resolution(&resolution)
            .map_err(|e| ConfigError::InvalidValue("DESKTOP_RESOLUTION".to_string(), e))?;

        let dpi = std::env::var("DESKTOP_DPI")
            .unwrap_or_else(|_| "96".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("DESKTOP_DPI".to_string(), format!("{}", e)))?;

        let completion_phrases = std::env::var("COMPLETION_PHRASES")
            .unwrap_or_else(|_| "task completed,done,finished".to_string())
            .split(',')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            sandbox_api_key,
            llm_api_key,
            model,
            max_iterations,
            max_tool_steps,
            session: SessionConfig { resolution, dpi },
            completion_phrases,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(sandbox_api_key: String, llm_api_key: String, model: String) -> Self {
        Self {
            sandbox_api_key,
            llm_api_key,
            model,
            max_iterations: 20,
            max_tool_steps: 10,
            session: SessionConfig::default(),
            completion_phrases: vec![
                "task completed".to_string(),
                "done".to_string(),
                "finished".to_string(),
            ],
        }
    }
}
