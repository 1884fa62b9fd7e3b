//! The agent loop.
//!
//! One task runs as one sequential loop: capture a screenshot, show it to the
//! model together with the task and the tool schemas, dispatch whatever tool
//! calls come back, and evaluate the stop conditions. The session is owned by
//! the loop for the duration of one run and is killed exactly once on every
//! exit path.
//!
//! # Algorithm
//! 1. Provision a session (failure propagates, nothing to clean up)
//! 2. Per iteration: screenshot -> model -> dispatch tool calls, feeding
//!    results back for up to `max_tool_steps` rounds
//! 3. Stop when the response text contains a completion phrase, when the
//!    model stops naturally with no pending tool calls, or when the
//!    iteration cap is reached
//!
//! There are no retries anywhere: any model or tool failure unwinds the loop
//! and surfaces to the caller after cleanup.

use base64::Engine;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, Role, ToolCall};
use crate::sandbox::{DesktopSession, SessionProvider};
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "You are a computer-use agent operating a remote Linux desktop. \
You see the screen through screenshots and act through the provided tools \
(mouse, keyboard, shell, browser). Work step by step: observe the screenshot, \
decide on the next action, and call the matching tool. Coordinates are pixels \
from the top-left corner. When the task is fully accomplished, say so plainly \
(e.g. 'Task completed') instead of calling more tools.";

/// How a loop execution ended. Hitting the iteration cap is a normal
/// (partial) termination, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The model signaled completion.
    Completed { summary: Option<String> },
    /// The iteration cap was reached before a completion signal.
    MaxIterations,
}

/// Drives one task against one sandbox session.
pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    config: Config,
}

impl AgentLoop {
    pub fn new(llm: Arc<dyn LlmClient>, config: Config) -> Self {
        Self {
            llm,
            registry: ToolRegistry::new(),
            config,
        }
    }

    /// Run a task to completion.
    ///
    /// Provisions a session, drives the loop, and kills the session exactly
    /// once regardless of outcome. Provisioning failures propagate directly;
    /// there is no session to clean up at that point.
    pub async fn run(
        &self,
        provider: &dyn SessionProvider,
        task: &str,
    ) -> anyhow::Result<TaskOutcome> {
        let session = provider.create(&self.config.session).await?;
        tracing::info!(stream_url = session.stream_url(), "Session ready");

        let result = self.drive(task, session.as_ref()).await;

        // Cleanup on every exit path. A failed kill is logged but never
        // masks the primary result.
        if let Err(e) = session.kill().await {
            tracing::warn!("Failed to terminate session: {}", e);
        }

        match &result {
            Ok(TaskOutcome::Completed { .. }) => tracing::info!("Task completed"),
            Ok(TaskOutcome::MaxIterations) => tracing::warn!(
                max_iterations = self.config.max_iterations,
                "Max iterations reached before completion"
            ),
            Err(e) => tracing::error!("Task failed: {}", e),
        }

        result
    }

    async fn drive(&self, task: &str, session: &dyn DesktopSession) -> anyhow::Result<TaskOutcome> {
        let definitions = self.registry.definitions();

        for iteration in 1..=self.config.max_iterations {
            tracing::info!(iteration, max = self.config.max_iterations, "Iteration");

            let png = session.screenshot().await?;
            let data_url = format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(&png)
            );

            let mut messages = vec![
                ChatMessage::new(Role::System, SYSTEM_PROMPT),
                ChatMessage::user_with_image(task, data_url),
            ];

            // Two-phase tool protocol: ask the model for a decision, dispatch
            // its tool calls locally, feed the results back, and repeat for a
            // bounded number of rounds within this iteration.
            let mut response = self
                .llm
                .chat_completion(&self.config.model, &messages, Some(&definitions))
                .await?;

            let mut steps = 0;
            while response.has_tool_calls() {
                let tool_calls = response.tool_calls.clone().unwrap_or_default();
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    tool_calls.clone(),
                ));

                for call in &tool_calls {
                    let result = self.dispatch(call, session).await?;
                    messages.push(ChatMessage::tool_result(&call.id, result.to_string()));
                }

                steps += 1;
                if steps >= self.config.max_tool_steps {
                    tracing::debug!(
                        steps,
                        "Tool-step budget for this iteration exhausted, taking a fresh screenshot"
                    );
                    break;
                }

                response = self
                    .llm
                    .chat_completion(&self.config.model, &messages, Some(&definitions))
                    .await?;
            }

            if let Some(text) = &response.content {
                tracing::info!(response = %text, "Model");
                if self.is_complete(text) {
                    return Ok(TaskOutcome::Completed {
                        summary: Some(text.clone()),
                    });
                }
            }

            // Natural stop with no pending tool calls also ends the task.
            if !response.has_tool_calls() && response.finish_reason.as_deref() == Some("stop") {
                return Ok(TaskOutcome::Completed {
                    summary: response.content.clone(),
                });
            }
        }

        Ok(TaskOutcome::MaxIterations)
    }

    /// Dispatch one tool call against the session. Any tool failure is fatal
    /// to the run.
    async fn dispatch(
        &self,
        call: &ToolCall,
        session: &dyn DesktopSession,
    ) -> anyhow::Result<Value> {
        tracing::info!(
            tool = %call.function.name,
            args = %call.function.arguments,
            "Tool call"
        );

        let args: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::Object(Default::default()))
        };

        let result = self
            .registry
            .execute(&call.function.name, args, Some(session))
            .await?;
        Ok(result)
    }

    /// Case-insensitive substring match against the configured phrase set.
    fn is_complete(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.config
            .completion_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase))
    }
}

/// Human-readable outcome line for the entry point's final banner.
pub fn describe_outcome(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Completed { summary } => match summary {
            Some(text) => format!("completed: {}", text),
            None => "completed".to_string(),
        },
        TaskOutcome::MaxIterations => "stopped: max iterations reached".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, ToolDefinition};
    use crate::sandbox::{
        CommandOutput, MouseButton, SandboxError, SessionConfig,
    };
    use crate::tools::test_support::{FakeSession, RemoteCall};

    /// Session double that shares call/kill state with the test through an Arc.
    struct SharedSession(Arc<FakeSession>);

    #[async_trait]
    impl DesktopSession for SharedSession {
        fn stream_url(&self) -> &str {
            self.0.stream_url()
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SandboxError> {
            self.0.screenshot().await
        }
        async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), SandboxError> {
            self.0.click(x, y, button).await
        }
        async fn double_click(&self, x: i64, y: i64) -> Result<(), SandboxError> {
            self.0.double_click(x, y).await
        }
        async fn move_mouse(&self, x: i64, y: i64) -> Result<(), SandboxError> {
            self.0.move_mouse(x, y).await
        }
        async fn write(&self, text: &str) -> Result<(), SandboxError> {
            self.0.write(text).await
        }
        async fn hotkey(&self, keys: &str) -> Result<(), SandboxError> {
            self.0.hotkey(keys).await
        }
        async fn scroll(&self, x: i64, y: i64, amount: i64) -> Result<(), SandboxError> {
            self.0.scroll(x, y, amount).await
        }
        async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError> {
            self.0.run_command(command).await
        }
        async fn open_url(&self, url: &str) -> Result<(), SandboxError> {
            self.0.open_url(url).await
        }
        async fn kill(&self) -> Result<(), SandboxError> {
            self.0.kill().await
        }
    }

    struct FakeProvider {
        session: Arc<FakeSession>,
        fail: bool,
    }

    impl FakeProvider {
        fn new(session: Arc<FakeSession>) -> Self {
            Self {
                session,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn create(
            &self,
            _config: &SessionConfig,
        ) -> Result<Box<dyn DesktopSession>, SandboxError> {
            if self.fail {
                return Err(SandboxError::Api {
                    status: 503,
                    body: "no capacity".to_string(),
                });
            }
            Ok(Box::new(SharedSession(Arc::clone(&self.session))))
        }
    }

    /// Model double that plays back scripted responses, then repeats a
    /// fallback indefinitely.
    struct ScriptedLlm {
        script: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        fallback: Option<ChatResponse>,
        calls: Mutex<usize>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<anyhow::Result<ChatResponse>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                fallback: None,
                calls: Mutex::new(0),
            }
        }

        fn repeating(fallback: ChatResponse) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Some(fallback),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            *self.calls.lock().unwrap() += 1;
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            match &self.fallback {
                Some(r) => Ok(r.clone()),
                None => panic!("ScriptedLlm exhausted"),
            }
        }
    }

    fn text_response(text: &str, finish: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            tool_calls: None,
            finish_reason: Some(finish.to_string()),
            usage: None,
            model: None,
        }
    }

    fn tool_response(name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: format!("call_{}", name),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }]),
            finish_reason: Some("tool_calls".to_string()),
            usage: None,
            model: None,
        }
    }

    fn test_config() -> Config {
        Config::new("sandbox-key".into(), "llm-key".into(), "test/model".into())
    }

    fn make_agent(llm: Arc<dyn LlmClient>, config: Config) -> AgentLoop {
        AgentLoop::new(llm, config)
    }

    #[test]
    fn test_completion_phrases_are_case_insensitive_substrings() {
        let agent = make_agent(Arc::new(ScriptedLlm::new(vec![])), test_config());
        assert!(agent.is_complete("Task Completed."));
        assert!(agent.is_complete("I am done now"));
        assert!(agent.is_complete("All finished"));
        assert!(agent.is_complete("DONE"));
        assert!(!agent.is_complete("still working on it"));
    }

    #[tokio::test]
    async fn test_end_to_end_open_url_then_done() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(tool_response("open_url", r#"{"url":"https://example.com"}"#)),
            Ok(text_response("done", "stop")),
        ]));
        let agent = make_agent(llm.clone(), test_config());

        let outcome = agent
            .run(&provider, "Open Firefox and navigate to example.com")
            .await
            .unwrap();

        assert!(matches!(outcome, TaskOutcome::Completed { .. }));
        let opens: Vec<_> = session
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RemoteCall::OpenUrl(_)))
            .collect();
        assert_eq!(
            opens,
            vec![RemoteCall::OpenUrl("https://example.com/".to_string())]
        );
        // One iteration: one screenshot, two model calls, one kill.
        assert_eq!(
            session
                .calls()
                .iter()
                .filter(|c| matches!(c, RemoteCall::Screenshot))
                .count(),
            1
        );
        assert_eq!(llm.call_count(), 2);
        assert_eq!(session.kills(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_once_on_completion() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response(
            "Task completed",
            "stop",
        ))]));
        let agent = make_agent(llm, test_config());

        let outcome = agent.run(&provider, "noop task").await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Completed { .. }));
        assert_eq!(session.kills(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_once_on_max_iterations() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        // The model keeps asking for the mouse to move and never concludes.
        let llm = Arc::new(ScriptedLlm::repeating(tool_response(
            "move_mouse",
            r#"{"x":1,"y":1}"#,
        )));
        let mut config = test_config();
        config.max_iterations = 20;
        config.max_tool_steps = 1;
        let agent = make_agent(llm, config);

        let outcome = agent.run(&provider, "endless task").await.unwrap();
        assert_eq!(outcome, TaskOutcome::MaxIterations);
        assert_eq!(session.kills(), 1);
        // Exactly 20 iterations ran: one screenshot each, never a 21st.
        assert_eq!(
            session
                .calls()
                .iter()
                .filter(|c| matches!(c, RemoteCall::Screenshot))
                .count(),
            20
        );
    }

    #[tokio::test]
    async fn test_cleanup_once_on_model_error() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        let llm = Arc::new(ScriptedLlm::new(vec![Err(anyhow::anyhow!(
            "model unavailable"
        ))]));
        let agent = make_agent(llm, test_config());

        let result = agent.run(&provider, "task").await;
        assert!(result.is_err());
        assert_eq!(session.kills(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_once_on_tool_error() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        // Unknown tool name makes dispatch fail; the failure is fatal.
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(tool_response(
            "teleport",
            "{}",
        ))]));
        let agent = make_agent(llm, test_config());

        let result = agent.run(&provider, "task").await;
        assert!(result.is_err());
        assert_eq!(session.kills(), 1);
    }

    #[tokio::test]
    async fn test_provisioning_failure_propagates_without_cleanup() {
        let session = Arc::new(FakeSession::new());
        let mut provider = FakeProvider::new(Arc::clone(&session));
        provider.fail = true;
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let agent = make_agent(llm, test_config());

        let result = agent.run(&provider, "task").await;
        assert!(result.is_err());
        // No session ever existed, so nothing was killed.
        assert_eq!(session.kills(), 0);
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_step_budget_bounds_rounds_within_iteration() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        let llm = Arc::new(ScriptedLlm::repeating(tool_response(
            "move_mouse",
            r#"{"x":2,"y":2}"#,
        )));
        let mut config = test_config();
        config.max_iterations = 1;
        config.max_tool_steps = 3;
        let agent = make_agent(llm.clone(), config);

        let outcome = agent.run(&provider, "task").await.unwrap();
        assert_eq!(outcome, TaskOutcome::MaxIterations);
        // 3 dispatch rounds in the single iteration, 3 model calls.
        assert_eq!(
            session
                .calls()
                .iter()
                .filter(|c| matches!(c, RemoteCall::MoveMouse { .. }))
                .count(),
            3
        );
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_natural_stop_without_phrase_completes() {
        let session = Arc::new(FakeSession::new());
        let provider = FakeProvider::new(Arc::clone(&session));
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response(
            "Nothing left for me to do here.",
            "stop",
        ))]));
        let agent = make_agent(llm, test_config());

        let outcome = agent.run(&provider, "task").await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Completed { .. }));
    }
}
