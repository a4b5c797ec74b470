//! Anthropic Messages API provider.
//!
//! Non-streaming calls with a tool loop: while the model stops with
//! `tool_use` and step budget remains, the requested tools are invoked and
//! their results sent back as `tool_result` blocks.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::LlmConfig;
use crate::domain::ports::{
    GenerateRequest, Generation, ModelProvider, ProviderError, TokenUsage, ToolSet,
};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    /// Build from the `llm` section. The key falls back to `ANTHROPIC_API_KEY`;
    /// `None` when neither is set.
    pub fn from_llm_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()))?;
        Some(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: Role,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize)]
struct ToolDefinition<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition<'a>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Failed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| if text.is_empty() { status.to_string() } else { text });
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Failed(format!("failed to parse response: {e}")))
    }
}

fn tool_definitions(tools: &ToolSet) -> Vec<ToolDefinition<'_>> {
    tools
        .tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.id(),
            description: t.description(),
            input_schema: t.input_schema(),
        })
        .collect()
}

async fn run_tools(tools: &ToolSet, blocks: &[ContentBlock]) -> Vec<ContentBlock> {
    let mut results = Vec::new();
    for block in blocks {
        let ContentBlock::ToolUse { id, name, input } = block else {
            continue;
        };
        let (content, is_error) = match tools.get(name) {
            Some(tool) => match tool.call(input.clone()).await {
                Ok(Value::String(s)) => (s, None),
                Ok(value) => (value.to_string(), None),
                Err(e) => (e.to_string(), Some(true)),
            },
            None => (format!("unknown tool '{name}'"), Some(true)),
        };
        tracing::debug!(tool = %name, failed = is_error.is_some(), "tool called");
        results.push(ContentBlock::ToolResult {
            tool_use_id: id.clone(),
            content,
            is_error,
        });
    }
    results
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        let steps = request.max_steps.unwrap_or(1).max(1);
        let tools = tool_definitions(&request.tools);
        let mut messages = vec![Message {
            role: Role::User,
            content: vec![ContentBlock::Text { text: request.user.clone() }],
        }];
        let mut usage = TokenUsage::default();
        let mut texts: Vec<String> = Vec::new();
        let mut model = self.config.model.clone();

        for step in 1..=steps {
            let response = {
                let body = MessagesRequest {
                    model: &self.config.model,
                    max_tokens: self.config.max_tokens,
                    system: (!request.system.is_empty()).then_some(request.system.as_str()),
                    messages: &messages,
                    tools: tools.clone(),
                };
                self.send(&body).await?
            };

            usage.add(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            });
            model = response.model;
            texts.extend(response.content.iter().filter_map(|b| match b {
                ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.clone()),
                _ => None,
            }));

            let wants_tools = response.stop_reason.as_deref() == Some("tool_use")
                && response.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
            if !wants_tools || request.tools.is_empty() {
                break;
            }
            if step == steps {
                tracing::debug!(steps, "tool step budget spent");
                break;
            }

            let results = run_tools(&request.tools, &response.content).await;
            messages.push(Message {
                role: Role::Assistant,
                content: response
                    .content
                    .into_iter()
                    .filter(|b| !matches!(b, ContentBlock::Other))
                    .collect(),
            });
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Ok(Generation {
            text: texts.join("\n"),
            usage,
            model,
        })
    }
}
