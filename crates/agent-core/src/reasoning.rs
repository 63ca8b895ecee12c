//! Reasoning Loop
//!
//! Submits the transcript and tool catalog to the provider, executes any
//! requested tools in the order requested, folds their results back in as
//! tool messages and repeats until the provider answers without tool calls.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Default cap on tool-call rounds per turn
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 16;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Tool-call rounds allowed before the turn fails
    pub max_tool_rounds: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            generation: GenerationOptions::default(),
        }
    }
}

/// Result of one agent run
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    /// Final assistant answer
    pub answer: String,

    /// Every message exchanged, ending with the final assistant message
    pub messages: Vec<Message>,

    /// Tool-call rounds that were executed
    pub rounds: usize,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Run the loop over a prepared message list.
    ///
    /// `cancel` is checked before every provider call; a cancelled token
    /// also interrupts an in-flight provider call.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome> {
        let schemas = self.tools.schemas();
        let mut rounds = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let completion = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                completion = self.provider.complete(&messages, &schemas, &self.config.generation) => completion?,
            };

            if completion.is_final() {
                let answer = completion.content;
                messages.push(Message::assistant(answer.clone()));
                tracing::debug!(rounds, "agent produced final answer");
                return Ok(AgentOutcome {
                    answer,
                    messages,
                    rounds,
                });
            }

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                tracing::warn!(
                    max = self.config.max_tool_rounds,
                    "provider kept requesting tools, stopping turn"
                );
                return Err(AgentError::ToolLoopExceeded(self.config.max_tool_rounds));
            }

            let calls: Vec<ToolCall> = completion
                .tool_calls
                .into_iter()
                .map(|mut call| {
                    if call.id.is_none() {
                        call.id = Some(format!("call_{}", uuid::Uuid::new_v4().simple()));
                    }
                    call
                })
                .collect();

            messages.push(Message::assistant_with_tool_calls(
                completion.content,
                calls.clone(),
            ));

            for call in &calls {
                let result = self.execute_tool(call).await?;
                messages.push(Message::tool(
                    Self::format_tool_result(&result),
                    call.id.clone(),
                ));
            }
        }
    }

    /// Single question against a system prompt, without session handling
    pub async fn ask(&self, system_prompt: &str, question: &str) -> Result<String> {
        let messages = vec![Message::system(system_prompt), Message::user(question)];
        let outcome = self.run(messages, &CancellationToken::new()).await?;
        Ok(outcome.answer)
    }

    /// Execute a tool call.
    ///
    /// Errors that end the turn (transport loss, cancellation) propagate;
    /// anything else becomes a failed result the provider can react to.
    async fn execute_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        tracing::info!(tool = %call.name, id = ?call.id, "executing tool");

        match self.tools.execute(call).await {
            Ok(mut result) => {
                result.id.clone_from(&call.id);
                Ok(result)
            }
            Err(e) if e.is_fatal_for_turn() => Err(e),
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "tool call failed");
                Ok(ToolResult {
                    name: call.name.clone(),
                    id: call.id.clone(),
                    success: false,
                    output: format!("Error: {}", e),
                })
            }
        }
    }

    /// Format tool result for conversation
    fn format_tool_result(result: &ToolResult) -> String {
        if result.success || result.output.starts_with("Error") {
            result.output.clone()
        } else {
            format!("Error: {}", result.output)
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_tool_rounds(mut self, max: usize) -> Self {
        self.config.max_tool_rounds = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
