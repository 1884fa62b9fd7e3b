//! Browser tool: open a URL in the sandbox's default browser.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{parse_args, DesktopTool, ToolError};
use crate::sandbox::DesktopSession;

#[derive(Deserialize)]
struct OpenUrlArgs {
    url: String,
}

/// Open a URL in the sandbox's default browser.
pub struct OpenUrl;

#[async_trait]
impl DesktopTool for OpenUrl {
    fn name(&self) -> &str {
        "open_url"
    }

    fn description(&self) -> &str {
        "Open a URL in the sandbox's default browser. The URL must be well-formed and absolute (e.g. 'https://example.com')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The absolute URL to open"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: OpenUrlArgs = parse_args(self.name(), args)?;

        // Malformed URLs fail here, before the remote call.
        let parsed = Url::parse(&args.url).map_err(|e| ToolError::InvalidArguments {
            tool: self.name().to_string(),
            message: format!("malformed url '{}': {}", args.url, e),
        })?;

        tracing::info!(url = %parsed, "Opening URL");
        session.open_url(parsed.as_str()).await?;
        Ok(json!({
            "success": true,
            "description": format!("opened {}", parsed),
        }))
    }
}
