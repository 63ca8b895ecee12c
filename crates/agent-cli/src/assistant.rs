//! One assistant session and its turns.
//!
//! Each turn logs the request, connects to the tool server, discovers the
//! tool catalog, runs the agent loop and shuts the server down again. A
//! failed turn leaves the session exactly as it was.

use std::sync::Arc;

use agent_core::{
    Agent, AgentOutcome, CancellationToken, LlmProvider, Message, Result, Session, ToolRegistry,
    WorklogStore,
};
use agent_mcp::{McpClient, ServerCommand, ToolDescriptor};

use crate::config::CliConfig;

/// Session-level announcement printed before the first turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBanner {
    Started(String),
    Continued(String),
}

impl std::fmt::Display for SessionBanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started(log) => write!(f, "\n=== Session Started ===\nLog file: {log}"),
            Self::Continued(log) => {
                write!(f, "\n=== Session Continued ===\nLoading from log file: {log}")
            }
        }
    }
}

pub struct Assistant {
    provider: Arc<dyn LlmProvider>,
    config: CliConfig,
    store: WorklogStore,
    session: Session,
}

impl Assistant {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CliConfig, store: WorklogStore) -> Self {
        let session = match &config.log {
            Some(log) => Session::resume_from_log(config.preset.clone(), log.clone()),
            None => Session::fresh(config.preset.clone()),
        }
        .with_retention(config.retention);

        Self {
            provider,
            config,
            store,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the session continues an existing worklog file
    pub fn banner(&self) -> SessionBanner {
        let log = self.session.worklog_id.to_string();
        if self.config.log.is_some() && self.store.exists(&log) {
            SessionBanner::Continued(log)
        } else {
            SessionBanner::Started(log)
        }
    }

    /// Run one turn and return the final answer.
    ///
    /// `on_tools` is called with the discovered catalog on the first turn.
    pub async fn run_turn(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
        on_tools: impl FnOnce(&[ToolDescriptor]),
    ) -> Result<String> {
        let turn = self.session.begin_turn(&self.store, query);

        let client = McpClient::connect(&self.config.tools_command)
            .await?
            .with_call_timeout(self.config.tool_timeout);
        let outcome = self.drive(&client, turn.messages, cancel, on_tools).await;
        client.shutdown().await;

        let outcome = outcome?;
        tracing::debug!(rounds = outcome.rounds, "turn finished");
        self.session.finish_turn(&turn.query, &outcome.answer);
        Ok(outcome.answer)
    }

    async fn drive(
        &self,
        client: &McpClient,
        messages: Vec<Message>,
        cancel: &CancellationToken,
        on_tools: impl FnOnce(&[ToolDescriptor]),
    ) -> Result<AgentOutcome> {
        let mut registry = ToolRegistry::new();
        let tools = client.register_tools(&mut registry).await?;
        if self.session.is_first_turn() {
            on_tools(&tools);
        }

        let agent = Agent::new(
            Arc::clone(&self.provider),
            Arc::new(registry),
            self.config.agent.clone(),
        );
        agent.run(messages, cancel).await
    }

    pub fn tools_command(&self) -> &ServerCommand {
        &self.config.tools_command
    }
}
