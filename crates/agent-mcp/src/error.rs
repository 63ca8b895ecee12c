//! Error types for the MCP bridge

use agent_core::AgentError;
use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Errors raised while talking to a tool server
#[derive(Error, Debug)]
pub enum McpError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn tool server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool server process has exited")]
    ProcessExited,

    #[error("timeout waiting for response to '{0}'")]
    Timeout(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("{0}")]
    Rpc(JsonRpcError),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<McpError> for AgentError {
    /// A JSON-RPC error reply is an ordinary tool failure; everything else
    /// means the channel is unusable for the rest of the turn.
    fn from(err: McpError) -> Self {
        match err {
            McpError::Rpc(e) => AgentError::ToolExecution(e.message),
            other => AgentError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_failures_are_fatal_for_turn() {
        let err: AgentError = McpError::ProcessExited.into();
        assert!(err.is_fatal_for_turn());

        let err: AgentError = McpError::Timeout("tools/call".into()).into();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[test]
    fn test_rpc_error_is_tool_failure() {
        let err: AgentError = McpError::Rpc(JsonRpcError::new(-32602, "bad params")).into();
        assert!(!err.is_fatal_for_turn());
        assert!(matches!(err, AgentError::ToolExecution(m) if m == "bad params"));
    }
}
