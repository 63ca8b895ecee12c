//! # agent-runtime
//!
//! Runtime providers for the mcp-cli system.
//!
//! ## Providers
//!
//! - **DeepSeek**: OpenAI-compatible chat completions with tool calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::DeepSeekProvider;
//!
//! let provider = DeepSeekProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(registry)
//!     .build()?;
//! ```

pub mod deepseek;
pub mod retry;

pub use deepseek::{DeepSeekConfig, DeepSeekProvider};
pub use retry::{RetryConfig, with_retry};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, Session, Tool, ToolRegistry,
};
