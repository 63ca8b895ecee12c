//! Tool-server client: handshake, discovery and invocation.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{McpError, Result};
use crate::protocol::{self, InitializeResult, ToolDescriptor, ToolOutput, ToolsListResult};
use crate::transport::{ServerCommand, StdioTransport};

/// An initialized connection to one tool server.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct McpClient {
    transport: Arc<StdioTransport>,
    server_info: Option<protocol::Implementation>,
    /// Deadline for `tools/call`; `None` lets a tool run as long as it needs
    call_timeout: Option<Duration>,
}

impl McpClient {
    /// Spawn the server and perform the `initialize` handshake.
    pub async fn connect(server: &ServerCommand) -> Result<Self> {
        tracing::debug!(command = %server, "connecting to tool server");
        let transport = StdioTransport::spawn(server)?;
        Self::initialize(transport).await
    }

    /// Perform the handshake over an already-open transport.
    pub async fn initialize(transport: StdioTransport) -> Result<Self> {
        let params = serde_json::to_value(protocol::initialize_params())?;

        let result = match transport.send_request("initialize", Some(params)).await {
            Ok(resp) => resp.into_result().map_err(|e| McpError::Handshake(e.to_string()))?,
            Err(e) => {
                transport.shutdown().await;
                return Err(McpError::Handshake(e.to_string()));
            }
        };

        let server_info = match serde_json::from_value::<InitializeResult>(result) {
            Ok(init) => {
                if init.protocol_version != protocol::PROTOCOL_VERSION {
                    tracing::warn!(
                        server_version = %init.protocol_version,
                        "tool server speaks a different protocol revision"
                    );
                }
                Some(init.server_info)
            }
            Err(e) => {
                tracing::debug!(error = %e, "unrecognized initialize result");
                None
            }
        };

        transport.send_notification("notifications/initialized").await?;

        tracing::debug!(server = ?server_info, "tool server initialized");

        Ok(Self {
            transport: Arc::new(transport),
            server_info,
            call_timeout: None,
        })
    }

    /// Bound every tool invocation by `timeout`.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub const fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn server_info(&self) -> Option<&protocol::Implementation> {
        self.server_info.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Enumerate the server's tool catalog.
    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self
            .transport
            .send_request("tools/list", None)
            .await?
            .into_result()
            .map_err(McpError::Rpc)?;

        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/list result: {e}")))?;

        tracing::debug!(count = list.tools.len(), "discovered tools");
        Ok(list.tools)
    }

    /// Invoke one tool and wait for its output.
    pub async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput> {
        if !self.transport.is_alive() {
            return Err(McpError::ProcessExited);
        }

        let params = json!({ "name": name, "arguments": arguments });
        let result = self
            .transport
            .send_request_within("tools/call", Some(params), self.call_timeout)
            .await?
            .into_result()
            .map_err(McpError::Rpc)?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    /// Discover the catalog and register every callable tool.
    ///
    /// Descriptors whose schema cannot be offered to the model are skipped.
    pub async fn register_tools(&self, registry: &mut ToolRegistry) -> Result<Vec<ToolDescriptor>> {
        let descriptors = self.discover().await?;
        let mut registered = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let tool = RemoteTool::new(self.clone(), &descriptor);
            match registry.try_register(Arc::new(tool)) {
                Ok(()) => registered.push(descriptor),
                Err(e) => tracing::warn!(tool = %descriptor.name, error = %e, "skipping tool"),
            }
        }
        Ok(registered)
    }

    /// Close the channel; returns the server's exit status if it exited cleanly.
    pub async fn shutdown(&self) -> Option<ExitStatus> {
        self.transport.shutdown().await
    }
}

/// A tool that lives in the server process
pub struct RemoteTool {
    client: McpClient,
    schema: ToolSchema,
}

impl RemoteTool {
    pub fn new(client: McpClient, descriptor: &ToolDescriptor) -> Self {
        Self {
            client,
            schema: descriptor.into(),
        }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> agent_core::Result<ToolResult> {
        let output = match self
            .client
            .invoke(&self.schema.name, call.arguments.clone())
            .await
        {
            Ok(output) => output,
            // The server is still healthy, only this call ran too long
            Err(McpError::Timeout(_)) => {
                let limit = self.client.call_timeout.unwrap_or_default();
                tracing::warn!(tool = %call.name, ?limit, "tool call timed out");
                return Ok(ToolResult::failure(
                    &call.name,
                    format!(
                        "Error: '{}' did not finish within {} seconds",
                        call.name,
                        limit.as_secs_f32()
                    ),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let text = output.joined_text();
        Ok(if output.is_error {
            ToolResult::failure(&call.name, text)
        } else {
            ToolResult::success(&call.name, text)
        })
    }
}
