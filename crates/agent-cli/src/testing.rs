//! Shared fixtures for unit tests.

use agent_core::{Completion, GenerationOptions, LlmProvider, Message, Result, ToolSchema};
use agent_mcp::ServerCommand;
use async_trait::async_trait;

use crate::config::{Cli, CliConfig};

/// Provider for paths that must never reach the model
pub struct NeverCalled;

#[async_trait]
impl LlmProvider for NeverCalled {
    fn name(&self) -> &str {
        "never"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        unreachable!("no provider call expected")
    }
}

/// Configuration with a dummy key and a tool server that cannot start
pub fn offline_config(cli: &Cli) -> CliConfig {
    let mut config = CliConfig::from_lookup(cli, |key| {
        (key == "DEEPSEEK_API_KEY").then(|| "k".to_string())
    })
    .unwrap();
    config.tools_command = ServerCommand::new("/nonexistent/mcp-tools");
    config
}
