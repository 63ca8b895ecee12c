//! # agent-tools
//!
//! The tool provider: a fixed catalog of file, worklog and shell tools,
//! served to the agent over MCP by the `mcp-tools` binary.
//!
//! | Tool                | Effect                                         |
//! |---------------------|------------------------------------------------|
//! | `list_files`        | sorted entries of a directory                  |
//! | `current_directory` | absolute working directory                     |
//! | `create_file`       | create/truncate a file with optional content   |
//! | `read_file`         | full text of a file                            |
//! | `write_file`        | overwrite or append                            |
//! | `append_to_worklog` | one timestamped worklog line                   |
//! | `execute_command`   | run a shell command, optionally logged         |

pub mod svckit;

use agent_core::{ToolRegistry, WorklogStore};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        AppendToWorklogTool, CreateFileTool, CurrentDirectoryTool, ExecuteCommandTool,
        ListFilesTool, ReadFileTool, WriteFileTool,
    };
}

use tools::{
    AppendToWorklogTool, CreateFileTool, CurrentDirectoryTool, ExecuteCommandTool, ListFilesTool,
    ReadFileTool, WriteFileTool,
};

/// The full catalog, with worklogs resolved against `store`
pub fn registry_with_store(store: &WorklogStore) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListFilesTool);
    registry.register(CurrentDirectoryTool);
    registry.register(CreateFileTool);
    registry.register(ReadFileTool);
    registry.register(WriteFileTool);
    registry.register(AppendToWorklogTool::new(store.clone()));
    registry.register(ExecuteCommandTool::new(store.clone()));
    registry
}

/// The full catalog, with worklogs resolved against the working directory
pub fn default_registry() -> ToolRegistry {
    registry_with_store(&WorklogStore::in_working_dir())
}
