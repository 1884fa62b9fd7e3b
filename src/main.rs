//! deskpilot - CLI entry point.
//!
//! Takes a single optional positional argument with the task description and
//! drives a remote desktop sandbox with a tool-calling vision model until the
//! task completes or the iteration cap is hit.

use std::sync::Arc;

use deskpilot::agent::{describe_outcome, AgentLoop};
use deskpilot::config::Config;
use deskpilot::llm::OpenRouterClient;
use deskpilot::sandbox::E2bClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TASK: &str =
    "Open the browser, navigate to news.ycombinator.com, and summarize the top story.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskpilot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    info!(
        model = %config.model,
        max_iterations = config.max_iterations,
        "Loaded configuration"
    );

    let task = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TASK.to_string());
    info!(task = %task, "Starting task");

    let provider = E2bClient::new(config.sandbox_api_key.clone());
    let llm = Arc::new(OpenRouterClient::new(config.llm_api_key.clone()));

    let agent = AgentLoop::new(llm, config);
    let outcome = agent.run(&provider, &task).await?;

    info!("{}", describe_outcome(&outcome));
    Ok(())
}
