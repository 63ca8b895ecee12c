//! Command line and environment configuration.
//!
//! Flags take precedence over environment variables, which take precedence
//! over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_core::reasoning::DEFAULT_MAX_TOOL_ROUNDS;
use agent_core::{AgentConfig, AgentError, GenerationOptions, HistoryRetention, Preset, Result};
use agent_mcp::ServerCommand;
use agent_runtime::{DeepSeekConfig, RetryConfig};
use clap::Parser;

/// Terminal assistant that drives file and shell tools through an LLM.
#[derive(Parser, Debug, Default)]
#[command(name = "mcp-cli", version)]
pub struct Cli {
    /// Worklog file to continue (created if it does not exist)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,

    /// Model identifier [env: DEEPSEEK_MODEL]
    #[arg(long)]
    pub model: Option<String>,

    /// Tool-call rounds allowed per turn [env: AGENT_MAX_TOOL_ROUNDS]
    #[arg(long)]
    pub max_tool_rounds: Option<usize>,

    /// Seconds a single tool call may run; unlimited by default [env: AGENT_TOOL_TIMEOUT_SECS]
    #[arg(long, value_name = "SECS")]
    pub tool_timeout: Option<u64>,

    /// Command line of the tool server [env: MCP_TOOLS_COMMAND]
    #[arg(long)]
    pub tools_command: Option<String>,

    /// JSON file with `role` and `instructions` replacing the default preset
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Keep the whole transcript in memory between turns
    #[arg(long)]
    pub full_history: bool,

    /// Initial query; the interactive prompt follows
    pub query: Vec<String>,
}

impl Cli {
    /// Words of the initial query joined by spaces, if any
    pub fn initial_query(&self) -> Option<String> {
        let query = self.query.join(" ");
        (!query.trim().is_empty()).then_some(query)
    }
}

/// Everything the assistant needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub provider: DeepSeekConfig,
    pub agent: AgentConfig,
    pub tools_command: ServerCommand,
    pub tool_timeout: Option<Duration>,
    pub preset: Preset,
    pub retention: HistoryRetention,
    pub log: Option<String>,
}

impl CliConfig {
    /// Resolve from flags and the process environment
    pub fn from_env(cli: &Cli) -> Result<Self> {
        Self::from_lookup(cli, |key| std::env::var(key).ok())
    }

    /// Resolve from flags and an arbitrary variable lookup
    pub fn from_lookup<F>(cli: &Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var(agent_runtime::deepseek::API_KEY_VAR).ok_or_else(|| {
            AgentError::Config(format!(
                "{} is not set; export it or add it to .env",
                agent_runtime::deepseek::API_KEY_VAR
            ))
        })?;

        let mut provider = DeepSeekConfig::new(api_key);
        if let Some(base_url) = var("DEEPSEEK_BASE_URL") {
            provider.base_url = base_url;
        }
        if let Some(secs) = parse_var::<u64>(&var, "AGENT_REQUEST_TIMEOUT_SECS")? {
            provider.timeout_secs = secs;
        }
        if let Some(retries) = parse_var::<u32>(&var, "AGENT_MAX_RETRIES")? {
            provider.retry = RetryConfig::with_retries(retries);
        }

        let max_tool_rounds = match cli.max_tool_rounds {
            Some(n) => n,
            None => parse_var(&var, "AGENT_MAX_TOOL_ROUNDS")?.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
        };
        if max_tool_rounds == 0 {
            return Err(AgentError::Config("max tool rounds must be at least 1".into()));
        }

        let tool_timeout = match cli.tool_timeout {
            Some(secs) => Some(secs),
            None => parse_var::<u64>(&var, "AGENT_TOOL_TIMEOUT_SECS")?,
        };
        if tool_timeout == Some(0) {
            return Err(AgentError::Config("tool timeout must be at least 1 second".into()));
        }

        let generation = GenerationOptions {
            model: cli
                .model
                .clone()
                .or_else(|| var("DEEPSEEK_MODEL"))
                .unwrap_or_else(|| GenerationOptions::default().model),
            ..GenerationOptions::default()
        };

        let tools_command = match cli.tools_command.clone().or_else(|| var("MCP_TOOLS_COMMAND")) {
            Some(line) => ServerCommand::parse(&line)
                .ok_or_else(|| AgentError::Config("tools command is empty".into()))?,
            None => default_tools_command()?,
        };

        let preset = match &cli.preset {
            Some(path) => load_preset(path)?,
            None => Preset::default(),
        };

        Ok(Self {
            provider,
            agent: AgentConfig {
                max_tool_rounds,
                generation,
            },
            tools_command,
            tool_timeout: tool_timeout.map(Duration::from_secs),
            preset,
            retention: if cli.full_history {
                HistoryRetention::Full
            } else {
                HistoryRetention::SystemOnly
            },
            log: cli.log.clone().filter(|l| !l.trim().is_empty()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AgentError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

/// The `mcp-tools` binary installed next to this executable
fn default_tools_command() -> Result<ServerCommand> {
    let exe = std::env::current_exe()
        .map_err(|e| AgentError::Config(format!("cannot locate the current executable: {e}")))?;
    let server = exe.with_file_name(format!("mcp-tools{}", std::env::consts::EXE_SUFFIX));
    Ok(ServerCommand::new(server.to_string_lossy()))
}

fn load_preset(path: &Path) -> Result<Preset> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("cannot read preset {}: {e}", path.display())))?;
    let preset: Preset = serde_json::from_str(&raw)
        .map_err(|e| AgentError::Config(format!("invalid preset {}: {e}", path.display())))?;
    if preset.instructions.is_empty() {
        return Err(AgentError::Config(format!(
            "preset {} has no instructions",
            path.display()
        )));
    }
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = CliConfig::from_lookup(&Cli::default(), env(&[])).unwrap_err();
        assert!(matches!(err, AgentError::Config(m) if m.contains("DEEPSEEK_API_KEY")));

        let err = CliConfig::from_lookup(&Cli::default(), env(&[("DEEPSEEK_API_KEY", "  ")]))
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config =
            CliConfig::from_lookup(&Cli::default(), env(&[("DEEPSEEK_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.provider.api_key, "sk-test");
        assert_eq!(config.provider.base_url, "https://api.deepseek.com");
        assert_eq!(config.agent.generation.model, "deepseek-chat");
        assert!(config.agent.generation.temperature.abs() < f32::EPSILON);
        assert_eq!(config.agent.generation.max_tokens, None);
        assert_eq!(config.agent.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(config.provider.retry.max_retries, 2);
        assert_eq!(config.retention, HistoryRetention::SystemOnly);
        assert!(config.tools_command.command.contains("mcp-tools"));
        assert_eq!(config.preset, Preset::default());
        assert_eq!(config.tool_timeout, None);
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli {
            model: Some("deepseek-reasoner".into()),
            max_tool_rounds: Some(4),
            tools_command: Some("python3 server.py".into()),
            full_history: true,
            log: Some("old.log".into()),
            ..Cli::default()
        };
        let config = CliConfig::from_lookup(
            &cli,
            env(&[
                ("DEEPSEEK_API_KEY", "k"),
                ("DEEPSEEK_MODEL", "other"),
                ("AGENT_MAX_TOOL_ROUNDS", "30"),
                ("MCP_TOOLS_COMMAND", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(config.agent.generation.model, "deepseek-reasoner");
        assert_eq!(config.agent.max_tool_rounds, 4);
        assert_eq!(config.tools_command.command, "python3");
        assert_eq!(config.tools_command.args, vec!["server.py"]);
        assert_eq!(config.retention, HistoryRetention::Full);
        assert_eq!(config.log.as_deref(), Some("old.log"));
    }

    #[test]
    fn test_environment_values() {
        let config = CliConfig::from_lookup(
            &Cli::default(),
            env(&[
                ("DEEPSEEK_API_KEY", "k"),
                ("DEEPSEEK_BASE_URL", "http://localhost:8080/v1"),
                ("AGENT_REQUEST_TIMEOUT_SECS", "5"),
                ("AGENT_MAX_RETRIES", "0"),
                ("AGENT_MAX_TOOL_ROUNDS", "3"),
                ("AGENT_TOOL_TIMEOUT_SECS", "600"),
            ]),
        )
        .unwrap();
        assert_eq!(config.tool_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.provider.retry.max_retries, 0);
        assert_eq!(config.agent.max_tool_rounds, 3);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = CliConfig::from_lookup(
            &Cli::default(),
            env(&[("DEEPSEEK_API_KEY", "k"), ("AGENT_MAX_TOOL_ROUNDS", "many")]),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::Config(m) if m.starts_with("AGENT_MAX_TOOL_ROUNDS=many")));

        let cli = Cli {
            max_tool_rounds: Some(0),
            ..Cli::default()
        };
        assert!(CliConfig::from_lookup(&cli, env(&[("DEEPSEEK_API_KEY", "k")])).is_err());

        let cli = Cli {
            tool_timeout: Some(0),
            ..Cli::default()
        };
        assert!(CliConfig::from_lookup(&cli, env(&[("DEEPSEEK_API_KEY", "k")])).is_err());
    }

    #[test]
    fn test_preset_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(
            &path,
            r#"{ "role": "Ops Helper", "instructions": ["Be brief."] }"#,
        )
        .unwrap();

        let cli = Cli {
            preset: Some(path),
            ..Cli::default()
        };
        let config = CliConfig::from_lookup(&cli, env(&[("DEEPSEEK_API_KEY", "k")])).unwrap();
        assert_eq!(config.preset.role, "Ops Helper");
        assert_eq!(config.preset.instructions, vec!["Be brief."]);
    }

    #[test]
    fn test_initial_query_joins_words() {
        let cli = Cli::parse_from(["mcp-cli", "-l", "w.log", "list", "files"]);
        assert_eq!(cli.log.as_deref(), Some("w.log"));
        assert_eq!(cli.initial_query().as_deref(), Some("list files"));
        assert_eq!(Cli::parse_from(["mcp-cli"]).initial_query(), None);
    }
}
