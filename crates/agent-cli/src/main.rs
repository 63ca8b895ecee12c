//! mcp-cli
//!
//! Terminal assistant: an LLM that works through file and shell tools served
//! over MCP, keeping a durable worklog of every session.
//!
//! ```sh
//! # Interactive
//! mcp-cli
//!
//! # Initial query, then interactive
//! mcp-cli list the files in this directory
//!
//! # Continue a previous worklog
//! mcp-cli -l worklog_20261018_093000_1a2b3c4d.log
//! ```

mod assistant;
mod config;
mod repl;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::WorklogStore;
use agent_runtime::DeepSeekProvider;

use crate::assistant::Assistant;
use crate::config::{Cli, CliConfig};
use crate::repl::TurnStatus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env(&cli).context("invalid configuration")?;
    let provider = DeepSeekProvider::from_config(config.provider.clone())
        .context("failed to set up the LLM client")?;

    let mut assistant = Assistant::new(Arc::new(provider), config, WorklogStore::in_working_dir());
    tracing::debug!(
        worklog = %assistant.session().worklog_id,
        tools = %assistant.tools_command(),
        "session ready"
    );

    println!("=== MCP CLI Assistant ===");
    println!("Type 'exit' to quit.");
    println!("{}", assistant.banner());
    println!("\nEnter your command or query:");

    if let Some(query) = cli.initial_query() {
        if repl::run_query(&mut assistant, &query).await == TurnStatus::Interrupted {
            println!("\nGoodbye!");
            return Ok(());
        }
    }

    repl::run(&mut assistant).await
}
