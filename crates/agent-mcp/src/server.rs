//! Tool-server side of the protocol.
//!
//! [`McpServer`] exposes a [`ToolRegistry`] over newline-delimited JSON-RPC.
//! Tool failures are returned as `isError` results, so nothing a tool does
//! can take the serving loop down.

use agent_core::{ToolCall, ToolRegistry};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::{
    IncomingMessage, Implementation, InitializeResult, INVALID_PARAMS, JsonRpcError, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, ToolCallParams, ToolDescriptor, ToolOutput,
    ToolsListResult,
};

/// Serves a tool registry to one client
pub struct McpServer {
    registry: ToolRegistry,
    info: Implementation,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            info: Implementation {
                name: "mcp-tools".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    /// Serve requests until the reader reaches end of input.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(tools = self.registry.len(), "tool server ready");

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(trimmed).await else {
                continue;
            };

            let mut payload = serde_json::to_string(&response)?;
            payload.push('\n');
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await?;
        }

        tracing::info!("client closed the channel, stopping");
        Ok(())
    }

    /// Handle one raw line; `None` when no reply is due.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let message: IncomingMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };

        if message.is_notification() {
            tracing::debug!(method = %message.method, "notification");
            return None;
        }

        let id = message.id.clone().unwrap_or(Value::Null);
        let reply = match self.dispatch(&message).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        Some(reply)
    }

    async fn dispatch(&self, message: &IncomingMessage) -> std::result::Result<Value, JsonRpcError> {
        match message.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools: Vec<ToolDescriptor> =
                    self.registry.schemas().into_iter().map(Into::into).collect();
                to_value(&ToolsListResult { tools })
            }
            "tools/call" => {
                let params: ToolCallParams =
                    serde_json::from_value(message.params.clone().unwrap_or(Value::Null))
                        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, e.to_string()))?;
                to_value(&self.call_tool(params).await)
            }
            other => {
                tracing::debug!(method = %other, "unknown method");
                Err(JsonRpcError::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                ))
            }
        }
    }

    fn initialize_result(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: json!({ "tools": {} }),
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    async fn call_tool(&self, params: ToolCallParams) -> ToolOutput {
        tracing::info!(tool = %params.name, "tools/call");
        let call = ToolCall::new(params.name, params.arguments);

        match self.registry.execute(&call).await {
            Ok(result) => ToolOutput::text(result.output, !result.success),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                ToolOutput::text(format!("Error: {e}"), true)
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(-32603, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ParameterSchema, Tool, ToolResult, ToolSchema};
    use async_trait::async_trait;
    use tokio::io::BufReader;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(
                "echo",
                "Echo the input",
                &[ParameterSchema::required("text", "string", "Text")],
            )
        }

        async fn execute(&self, call: &ToolCall) -> agent_core::Result<ToolResult> {
            Ok(ToolResult::success("echo", call.str_arg("text").unwrap_or_default()))
        }
    }

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn test_initialize_reports_protocol_and_name() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let result = resp.into_result().unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "mcp-tools");
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(resp.id, json!("x"));
        assert_eq!(resp.into_result().unwrap_err().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_garbage_is_parse_error() {
        let resp = server().handle_line("{not json").await.unwrap();
        assert_eq!(resp.into_result().unwrap_err().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_call_failures_are_error_results() {
        let srv = server();

        let resp = srv
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#)
            .await
            .unwrap();
        let output: ToolOutput = serde_json::from_value(resp.into_result().unwrap()).unwrap();
        assert!(output.is_error);
        assert!(output.joined_text().contains("nope"));

        let resp = srv
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{}}}"#)
            .await
            .unwrap();
        let output: ToolOutput = serde_json::from_value(resp.into_result().unwrap()).unwrap();
        assert!(output.is_error);
        assert!(output.joined_text().contains("Missing required parameter: text"));
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
            "\n",
        );
        let mut output = Vec::new();
        server()
            .serve(BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let lines: Vec<JsonRpcResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].result.as_ref().unwrap()["tools"][0]["name"], "echo");
        assert_eq!(lines[1].result.as_ref().unwrap()["content"][0]["text"], "hi");
    }
}
