//! # agent-mcp
//!
//! Transport and discovery bridge between the agent and an out-of-process
//! tool server, speaking MCP (JSON-RPC 2.0, one message per line) over the
//! server's stdin/stdout.
//!
//! ```rust,ignore
//! let client = McpClient::connect(&ServerCommand::new("mcp-tools")).await?;
//! let mut registry = ToolRegistry::new();
//! client.register_tools(&mut registry).await?;
//! // ... run the agent ...
//! client.shutdown().await;
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{McpClient, RemoteTool};
pub use error::McpError;
pub use protocol::{ToolDescriptor, ToolOutput};
pub use server::McpServer;
pub use transport::{ServerCommand, StdioTransport};
