//! Service Kit - Provider Tools
//!
//! File, worklog and shell tools implementing `agent_core::Tool`. Every
//! failure is reported as an `Error ...` result text rather than an error
//! value, so the serving process never goes down because of a tool.

mod command;
mod files;
mod worklog;

pub use command::ExecuteCommandTool;
pub use files::{CreateFileTool, CurrentDirectoryTool, ListFilesTool, ReadFileTool, WriteFileTool};
pub use worklog::AppendToWorklogTool;
