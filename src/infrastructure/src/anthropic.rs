//! Chat-model client. `ChatModel` is the seam between the orchestration
//! logic and the model provider; the shipped implementation speaks the
//! Anthropic messages API with tool-use content blocks, and tests script
//! responses through the same trait.

use crate::config::Config;
use async_trait::async_trait;
use domain::chat::{ModelMessage, ModelResponse, ToolCallRequest, ToolSchema};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{AgentError, Result};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(
        &self,
        system: &str,
        messages: &[ModelMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelResponse>;
}

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<&'a ToolSchema>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiBlock>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
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
    },
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiBlock>,
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.request_timeout_secs.max(60)))
            .build()
            .map_err(|e| AgentError::api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            api_key: config.anthropic_api_key.clone(),
            model: config.model_name.clone(),
        })
    }

    fn to_api_messages(messages: &[ModelMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|message| match message {
                ModelMessage::User(text) => ApiMessage {
                    role: "user",
                    content: vec![ApiBlock::Text { text: text.clone() }],
                },
                ModelMessage::Assistant { text, tool_calls } => {
                    let mut content = Vec::new();
                    if !text.is_empty() {
                        content.push(ApiBlock::Text { text: text.clone() });
                    }
                    for call in tool_calls {
                        content.push(ApiBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        });
                    }
                    ApiMessage {
                        role: "assistant",
                        content,
                    }
                }
                ModelMessage::ToolResults(results) => ApiMessage {
                    role: "user",
                    content: results
                        .iter()
                        .map(|r| ApiBlock::ToolResult {
                            tool_use_id: r.tool_call_id.clone(),
                            content: r.content.clone(),
                        })
                        .collect(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn chat(
        &self,
        system: &str,
        messages: &[ModelMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelResponse> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: Self::to_api_messages(messages),
            tools: tools.iter().collect(),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::api(format!("model request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::from_status(
                status.as_u16(),
                format!("model call: {} {}", status.as_u16(), body),
            ));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| AgentError::api(format!("invalid model response: {e}")))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ApiBlock::Text { text: t } => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&t);
                }
                ApiBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest {
                        id,
                        name,
                        arguments: input,
                    });
                }
                ApiBlock::ToolResult { .. } => {}
            }
        }
        tracing::debug!(tool_calls = tool_calls.len(), "model response received");
        Ok(ModelResponse { text, tool_calls })
    }
}
