//! Shell Command Tool
//!
//! Runs one non-interactive shell command to completion and reports its
//! captured output. With a `log_filename` the run is bracketed by two
//! worklog entries.

use std::process::Stdio;

use async_trait::async_trait;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, WorklogStore,
    tool::ParameterSchema,
};

pub struct ExecuteCommandTool {
    store: WorklogStore,
}

impl ExecuteCommandTool {
    pub fn new(store: WorklogStore) -> Self {
        Self { store }
    }

    fn log(&self, log_filename: Option<&str>, text: &str) {
        let Some(log_filename) = log_filename else {
            return;
        };
        if let Err(e) = self.store.append(log_filename, text) {
            tracing::warn!(worklog = %log_filename, error = %e, "failed to write worklog entry");
        }
    }
}

impl Default for ExecuteCommandTool {
    fn default() -> Self {
        Self::new(WorklogStore::in_working_dir())
    }
}

fn shell(command: &str) -> tokio::process::Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C");
        cmd
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "execute_command",
            "Execute a shell command and return the output.",
            &[
                ParameterSchema::required("command", "string", "Shell command to run"),
                ParameterSchema {
                    required: false,
                    ..ParameterSchema::required(
                        "log_filename",
                        "string",
                        "Worklog filename; when given, the run is recorded in the worklog",
                    )
                },
            ],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let command = call.str_arg("command").unwrap_or_default();
        let log_filename = call.str_arg("log_filename").filter(|f| !f.trim().is_empty());

        self.log(log_filename, &format!("About to execute command: {command}"));
        tracing::info!(%command, "executing shell command");

        let output = match shell(command).output().await {
            Ok(output) => output,
            Err(e) => {
                self.log(log_filename, &format!("Command '{command}' failed to start: {e}"));
                return Ok(ToolResult::failure(
                    "execute_command",
                    format!("Error executing command: {e}"),
                ));
            }
        };

        // Killed by a signal: no exit code
        let code = output.status.code().unwrap_or(-1);
        self.log(
            log_filename,
            &format!("Command '{command}' finished with exit code {code}"),
        );

        Ok(ToolResult::success(
            "execute_command",
            format!(
                "Command output: {}\nError: {}\nReturn code: {code}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    fn call(args: Value) -> ToolCall {
        let arguments: Map<String, Value> = serde_json::from_value(args).unwrap();
        ToolCall::new("execute_command", arguments)
    }

    #[tokio::test]
    async fn test_echo_with_worklog() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorklogStore::new(dir.path());
        let tool = ExecuteCommandTool::new(store.clone());

        let result = tool
            .execute(&call(json!({ "command": "echo hello", "log_filename": "w.log" })))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Command output: hello\n\nError: \nReturn code: 0");

        let entries = store.entries("w.log").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "About to execute command: echo hello");
        assert_eq!(entries[1].text, "Command 'echo hello' finished with exit code 0");
    }

    #[tokio::test]
    async fn test_failing_command_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecuteCommandTool::new(WorklogStore::new(dir.path()));

        let result = tool
            .execute(&call(json!({ "command": "echo oops >&2; exit 3" })))
            .await
            .unwrap();
        assert!(result.output.contains("Error: oops"));
        assert!(result.output.ends_with("Return code: 3"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
