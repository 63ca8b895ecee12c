//! DeepSeek LLM Provider
//!
//! Implementation of `LlmProvider` for DeepSeek's chat completions API.
//! The wire format is the OpenAI one, so any compatible endpoint works by
//! changing `base_url`.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::retry::{RetryConfig, classify_reqwest, with_retry};

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "DEEPSEEK_API_KEY";

/// DeepSeek provider configuration
#[derive(Clone, Debug)]
pub struct DeepSeekConfig {
    /// Bearer token
    pub api_key: String,

    /// API base URL (without `/chat/completions`)
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl DeepSeekConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.deepseek.com".into(),
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }

    /// Read the key (required) and base URL (optional) from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(AgentError::Config(format!("{API_KEY_VAR} is not set")));
        }

        let mut config = Self::new(api_key.trim());
        if let Ok(base_url) = std::env::var("DEEPSEEK_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        Ok(config)
    }
}

/// DeepSeek LLM provider
pub struct DeepSeekProvider {
    client: reqwest::Client,
    config: DeepSeekConfig,
}

impl DeepSeekProvider {
    /// Create from configuration
    pub fn from_config(config: DeepSeekConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::Config(format!("{API_KEY_VAR} is empty")));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(DeepSeekConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the JSON request body
    fn build_request_body(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": messages.iter().map(convert_message).collect::<Vec<_>>(),
            "temperature": options.temperature,
            "stream": false,
        });

        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(convert_tool).collect());
        }
        if let Some(max) = options.max_tokens {
            body["max_tokens"] = json!(max);
        }
        body
    }

    /// Convert a chat completions response body to a completion
    fn parse_completion(body: &Value) -> Result<Completion> {
        let choice = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| AgentError::Provider("no choices in response".into()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| AgentError::Provider("no message in choice".into()))?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
            .unwrap_or_default();

        let usage = body.get("usage").and_then(|u| {
            Some(TokenUsage {
                prompt_tokens: u32::try_from(u.get("prompt_tokens")?.as_u64()?).ok()?,
                completion_tokens: u32::try_from(u.get("completion_tokens")?.as_u64()?).ok()?,
                total_tokens: u32::try_from(u.get("total_tokens")?.as_u64()?).ok()?,
            })
        });

        Ok(Completion {
            content,
            tool_calls,
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            usage,
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(FinishReason::from_api),
        })
    }

    async fn send_once(&self, body: &Value) -> Result<Completion> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_reqwest(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| classify_reqwest(&e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        let json: Value = serde_json::from_str(&text)?;
        Self::parse_completion(&json)
    }
}

/// Map an HTTP error status to the agent taxonomy
fn classify_status(status: u16, body: &str) -> AgentError {
    let detail = format!("HTTP {status} - {body}");
    match status {
        401 | 403 => AgentError::Auth(detail),
        429 => AgentError::RateLimited(detail),
        500..=599 => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

fn convert_message(message: &Message) -> Value {
    match message.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        Role::Assistant if message.has_tool_calls() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id.clone().unwrap_or_default(),
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": Value::Object(call.arguments.clone()).to_string(),
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        role => json!({ "role": role.to_string(), "content": message.content }),
    }
}

fn convert_tool(tool: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

fn parse_tool_call(raw: &Value) -> Option<ToolCall> {
    let function = raw.get("function")?;
    let name = function.get("name")?.as_str()?;
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => serde_json::from_str::<Map<String, Value>>(s).unwrap_or_else(|e| {
            tracing::warn!(tool = %name, error = %e, "tool call arguments are not a JSON object");
            Map::new()
        }),
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let mut call = ToolCall::new(name, arguments);
    call.id = raw.get("id").and_then(Value::as_str).map(String::from);
    Some(call)
}

#[async_trait]
impl LlmProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request_body(messages, tools, options);

        tracing::debug!(
            model = %options.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let completion = with_retry(&self.config.retry, || self.send_once(&body)).await?;

        tracing::debug!(
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.finish_reason,
            "chat completion received"
        );
        Ok(completion)
    }
}
