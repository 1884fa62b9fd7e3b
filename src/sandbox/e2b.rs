//! HTTP client for the E2B desktop sandbox API.
//!
//! One `E2bSession` maps to one provisioned virtual machine. All input
//! injection goes through the `actions` endpoint; shell commands and
//! screenshots have their own endpoints. There are no retries here: any
//! failure surfaces to the agent loop, which tears the session down.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    CommandOutput, DesktopSession, MouseButton, SandboxError, SessionConfig, SessionProvider,
};

const E2B_API_URL: &str = "https://api.e2b.app/desktops";

/// Client for provisioning E2B desktop sandboxes.
pub struct E2bClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl E2bClient {
    /// Create a new client with the default API endpoint.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: E2B_API_URL.to_string(),
        }
    }

    /// Create a client against a custom endpoint.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl SessionProvider for E2bClient {
    async fn create(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn DesktopSession>, SandboxError> {
        let (width, height) = config.resolution;
        tracing::debug!(width, height, dpi = config.dpi, "Provisioning desktop sandbox");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&CreateRequest {
                width,
                height,
                dpi: config.dpi,
            })
            .send()
            .await
            .map_err(request_error)?;

        let created: CreateResponse = read_json(response).await?;

        Ok(Box::new(E2bSession {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            sandbox_url: format!("{}/{}", self.base_url, created.sandbox_id),
            stream_url: created.stream_url,
        }))
    }
}

/// An active E2B desktop session.
pub struct E2bSession {
    client: Client,
    api_key: String,
    sandbox_url: String,
    stream_url: String,
}

impl E2bSession {
    /// Send an input-injection action and discard the body.
    async fn action(&self, action: Action<'_>) -> Result<(), SandboxError> {
        let response = self
            .client
            .post(format!("{}/actions", self.sandbox_url))
            .bearer_auth(&self.api_key)
            .json(&action)
            .send()
            .await
            .map_err(request_error)?;

        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl DesktopSession for E2bSession {
    fn stream_url(&self) -> &str {
        &self.stream_url
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SandboxError> {
        let response = self
            .client
            .get(format!("{}/screenshot", self.sandbox_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), SandboxError> {
        self.action(Action::Click {
            x,
            y,
            button: button.as_str(),
        })
        .await
    }

    async fn double_click(&self, x: i64, y: i64) -> Result<(), SandboxError> {
        self.action(Action::DoubleClick { x, y }).await
    }

    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), SandboxError> {
        self.action(Action::MoveMouse { x, y }).await
    }

    async fn write(&self, text: &str) -> Result<(), SandboxError> {
        self.action(Action::Write { text }).await
    }

    async fn hotkey(&self, keys: &str) -> Result<(), SandboxError> {
        self.action(Action::Hotkey { keys }).await
    }

    async fn scroll(&self, x: i64, y: i64, amount: i64) -> Result<(), SandboxError> {
        self.action(Action::Scroll { x, y, amount }).await
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError> {
        let response = self
            .client
            .post(format!("{}/commands", self.sandbox_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await
            .map_err(request_error)?;

        read_json(response).await
    }

    async fn open_url(&self, url: &str) -> Result<(), SandboxError> {
        self.action(Action::OpenUrl { url }).await
    }

    async fn kill(&self) -> Result<(), SandboxError> {
        let response = self
            .client
            .delete(&self.sandbox_url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        check_status(response).await.map(|_| ())
    }
}

#[derive(Serialize)]
struct CreateRequest {
    width: u32,
    height: u32,
    dpi: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    sandbox_id: String,
    stream_url: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Action<'a> {
    Click { x: i64, y: i64, button: &'a str },
    DoubleClick { x: i64, y: i64 },
    MoveMouse { x: i64, y: i64 },
    Write { text: &'a str },
    Hotkey { keys: &'a str },
    Scroll { x: i64, y: i64, amount: i64 },
    OpenUrl { url: &'a str },
}

fn request_error(e: reqwest::Error) -> SandboxError {
    SandboxError::Network(e.to_string())
}

/// Fail on non-success HTTP status, carrying the body for diagnostics.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SandboxError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SandboxError> {
    let response = check_status(response).await?;
    let body = response.text().await.map_err(request_error)?;
    serde_json::from_str(&body)
        .map_err(|e| SandboxError::Parse(format!("{}, body: {}", e, body)))
}
