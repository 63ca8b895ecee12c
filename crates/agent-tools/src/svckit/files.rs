//! File System Tools
//!
//! Directory listing and whole-file read/write. Paths are resolved against
//! the server's working directory.

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, tool::ParameterSchema};

/// Lists the entries of a directory
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "list_files",
            "List files in the specified directory.",
            &[ParameterSchema::optional(
                "directory",
                "string",
                "Directory to list (defaults to the current directory)",
                json!("."),
            )],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let directory = call.str_arg("directory").unwrap_or(".");

        match list_dir(directory).await {
            Ok(names) => Ok(ToolResult::success(
                "list_files",
                format!("Files in {directory}:\n{}", names.join("\n")),
            )),
            Err(e) => Ok(ToolResult::failure(
                "list_files",
                format!("Error listing files: {e}"),
            )),
        }
    }
}

/// Entry names, sorted for stable output
async fn list_dir(directory: &str) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Reports the server's working directory
pub struct CurrentDirectoryTool;

#[async_trait]
impl Tool for CurrentDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("current_directory", "Get the current working directory.", &[])
    }

    async fn execute(&self, _call: &ToolCall) -> CoreResult<ToolResult> {
        Ok(match std::env::current_dir() {
            Ok(dir) => ToolResult::success(
                "current_directory",
                format!("Current directory: {}", dir.display()),
            ),
            Err(e) => ToolResult::failure(
                "current_directory",
                format!("Error getting current directory: {e}"),
            ),
        })
    }
}

/// Creates (or truncates) a file
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "create_file",
            "Create a new file with optional content.",
            &[
                ParameterSchema::required("filename", "string", "Path of the file to create"),
                ParameterSchema::optional("content", "string", "Initial content", json!("")),
            ],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let filename = call.str_arg("filename").unwrap_or_default();
        let content = call.str_arg("content").unwrap_or_default();

        Ok(match tokio::fs::write(filename, content).await {
            Ok(()) => ToolResult::success(
                "create_file",
                format!("File '{filename}' created successfully."),
            ),
            Err(e) => ToolResult::failure("create_file", format!("Error creating file: {e}")),
        })
    }
}

/// Returns the full content of a text file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "read_file",
            "Read the content of a file.",
            &[ParameterSchema::required("filename", "string", "Path of the file to read")],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let filename = call.str_arg("filename").unwrap_or_default();

        Ok(match tokio::fs::read_to_string(filename).await {
            Ok(content) => ToolResult::success(
                "read_file",
                format!("Content of '{filename}':\n{content}"),
            ),
            Err(e) => ToolResult::failure("read_file", format!("Error reading file: {e}")),
        })
    }
}

/// Writes or appends content to a file
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "write_file",
            "Write content to a file, replacing it or appending to it.",
            &[
                ParameterSchema::required("filename", "string", "Path of the file to write"),
                ParameterSchema::required("content", "string", "Content to write"),
                ParameterSchema::optional(
                    "append",
                    "boolean",
                    "Append instead of overwriting",
                    json!(false),
                ),
            ],
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let filename = call.str_arg("filename").unwrap_or_default();
        let content = call.str_arg("content").unwrap_or_default();
        let append = call.bool_arg("append").unwrap_or(false);

        let written = if append {
            append_to(filename, content).await
        } else {
            tokio::fs::write(filename, content).await
        };

        Ok(match written {
            Ok(()) if append => {
                ToolResult::success("write_file", format!("Content appended to '{filename}'."))
            }
            Ok(()) => ToolResult::success("write_file", format!("Content written to '{filename}'.")),
            Err(e) => ToolResult::failure("write_file", format!("Error writing file: {e}")),
        })
    }
}

async fn append_to(filename: &str, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(filename)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn call(name: &str, args: Value) -> ToolCall {
        let arguments: Map<String, Value> = serde_json::from_value(args).unwrap();
        ToolCall::new(name, arguments)
    }

    #[tokio::test]
    async fn test_list_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let path = dir.path().to_string_lossy().into_owned();

        let result = ListFilesTool
            .execute(&call("list_files", json!({ "directory": path })))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, format!("Files in {path}:\na.txt\nb.txt"));
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_error_text() {
        let result = ListFilesTool
            .execute(&call("list_files", json!({ "directory": "/definitely/not/here" })))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error listing files:"));
    }

    #[tokio::test]
    async fn test_current_directory_is_absolute() {
        let result = CurrentDirectoryTool
            .execute(&call("current_directory", json!({})))
            .await
            .unwrap();
        let path = result.output.strip_prefix("Current directory: ").unwrap();
        assert!(std::path::Path::new(path).is_absolute());
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt").to_string_lossy().into_owned();

        let created = CreateFileTool
            .execute(&call("create_file", json!({ "filename": file, "content": "one\ntwo" })))
            .await
            .unwrap();
        assert_eq!(created.output, format!("File '{file}' created successfully."));

        let read = ReadFileTool
            .execute(&call("read_file", json!({ "filename": file })))
            .await
            .unwrap();
        assert_eq!(read.output, format!("Content of '{file}':\none\ntwo"));
    }

    #[tokio::test]
    async fn test_create_defaults_to_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");

        CreateFileTool
            .execute(&call("create_file", json!({ "filename": file.to_string_lossy() })))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error_text() {
        let result = ReadFileTool
            .execute(&call("read_file", json!({ "filename": "/no/such/file.txt" })))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error reading file:"));
    }

    #[tokio::test]
    async fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt").to_string_lossy().into_owned();

        let written = WriteFileTool
            .execute(&call("write_file", json!({ "filename": file, "content": "a" })))
            .await
            .unwrap();
        assert_eq!(written.output, format!("Content written to '{file}'."));

        let appended = WriteFileTool
            .execute(&call(
                "write_file",
                json!({ "filename": file, "content": "b", "append": true }),
            ))
            .await
            .unwrap();
        assert_eq!(appended.output, format!("Content appended to '{file}'."));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_is_error_text() {
        let result = WriteFileTool
            .execute(&call(
                "write_file",
                json!({ "filename": "/no/such/dir/out.txt", "content": "x" }),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error writing file:"));
    }
}
