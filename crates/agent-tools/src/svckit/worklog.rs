//! Worklog Tool
//!
//! Appends one timestamped line to the session worklog.

use async_trait::async_trait;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, WorklogStore,
    tool::ParameterSchema,
};

pub struct AppendToWorklogTool {
    store: WorklogStore,
}

impl AppendToWorklogTool {
    pub fn new(store: WorklogStore) -> Self {
        Self { store }
    }
}

impl Default for AppendToWorklogTool {
    fn default() -> Self {
        Self::new(WorklogStore::in_working_dir())
    }
}

#[async_trait]
impl Tool for AppendToWorklogTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "append_to_worklog",
            "Append a timestamped entry to the session worklog.",
            &[
                ParameterSchema::required("content", "string", "Text of the entry"),
                ParameterSchema::required(
                    "log_filename",
                    "string",
                    "Worklog filename given in the system instructions",
                ),
            ],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let content = call.str_arg("content").unwrap_or_default();
        let log_filename = call.str_arg("log_filename").unwrap_or_default();

        if log_filename.trim().is_empty() {
            return Ok(ToolResult::failure(
                "append_to_worklog",
                "Error appending to worklog: log_filename is empty",
            ));
        }

        Ok(match self.store.append(log_filename, content) {
            Ok(()) => ToolResult::success(
                "append_to_worklog",
                format!("Worklog entry added to '{log_filename}'."),
            ),
            Err(e) => ToolResult::failure(
                "append_to_worklog",
                format!("Error appending to worklog: {e}"),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    fn call(args: Value) -> ToolCall {
        let arguments: Map<String, Value> = serde_json::from_value(args).unwrap();
        ToolCall::new("append_to_worklog", arguments)
    }

    #[tokio::test]
    async fn test_appends_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorklogStore::new(dir.path());
        let tool = AppendToWorklogTool::new(store.clone());

        let result = tool
            .execute(&call(json!({ "content": "checked disk\nall good", "log_filename": "w.log" })))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Worklog entry added to 'w.log'.");

        let entries = store.entries("w.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "checked disk all good");
    }

    #[tokio::test]
    async fn test_empty_filename_is_error_text() {
        let tool = AppendToWorklogTool::default();
        let result = tool
            .execute(&call(json!({ "content": "x", "log_filename": " " })))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error appending to worklog"));
    }
}
