//! Shell command execution inside the sandbox.
//!
//! Deliberately unrestricted: no allow-list, no argument filtering. The
//! sandbox virtual machine is the trust boundary; anything the command
//! damages is torn down with the session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, DesktopTool, ToolError};
use crate::sandbox::DesktopSession;

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
}

/// Run a shell command inside the sandbox.
pub struct RunCommand;

#[async_trait]
impl DesktopTool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the sandbox and return its exit code, stdout, and stderr. A non-zero exit code is reported as success=false, not an error."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, session: &dyn DesktopSession) -> Result<Value, ToolError> {
        let args: RunCommandArgs = parse_args(self.name(), args)?;
        tracing::info!(command = %args.command, "Running command");

        let output = session.run_command(&args.command).await?;
        if output.exit_code != 0 {
            tracing::debug!(exit_code = output.exit_code, "Command exited non-zero");
        }

        Ok(json!({
            "success": output.exit_code == 0,
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
        }))
    }
}
