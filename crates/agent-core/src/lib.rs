//! # agent-core
//!
//! Core agent logic with a provider-agnostic reasoning capability, a
//! runtime-populated tool registry, sessions and the append-only worklog.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Turn                               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────────┐ │
//! │  │   Session   │──►│  Reasoning  │──►│   LlmProvider       │ │
//! │  │ (+ Worklog) │   │    Loop     │   │   (Strategy)        │ │
//! │  └─────────────┘   └──────┬──────┘   └─────────────────────┘ │
//! │                           │                                  │
//! │                    ┌──────▼──────┐                           │
//! │                    │    Tools    │  local or remote (MCP)    │
//! │                    │  Registry   │                           │
//! │                    └─────────────┘                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod message;
pub mod preset;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;
pub mod worklog;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use preset::Preset;
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentOutcome};
pub use session::{HistoryRetention, Session, SessionState, TurnContext, WorklogId};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
pub use worklog::{WorklogEntry, WorklogStore};

/// Re-exported so callers do not need their own `tokio-util` dependency
pub use tokio_util::sync::CancellationToken;
