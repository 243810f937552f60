//! Anthropic provider implementation for snow-agent
//!
//! Talks to the Messages API (`POST /v1/messages`) with tool use. The
//! transcript is lowered to neutral messages first, then folded into
//! Anthropic's content-block form where consecutive same-role messages are
//! merged and tool results travel as `tool_result` blocks in user messages.

use crate::agent::conversation::Turn;
use crate::config::AnthropicConfig;
use crate::error::{Result, SnowAgentError};
use crate::operations::{OperationCatalog, OperationRequest};
use crate::providers::{
    lower_transcript, validate_message_sequence, CompletionResponse, Message, Provider,
    TokenUsage,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
    system_prompt: String,
    max_result_chars: usize,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Arguments
    ///
    /// * `config` - API key, model and limits
    /// * `system_prompt` - Instructions sent with every request
    /// * `max_result_chars` - Cap on each rendered operation result
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::config::AnthropicConfig;
    /// use snow_agent::providers::AnthropicProvider;
    ///
    /// let config = AnthropicConfig {
    ///     api_key: "sk-ant-test".to_string(),
    ///     ..Default::default()
    /// };
    /// assert!(AnthropicProvider::new(config, "You configure ServiceNow.", 20_000).is_ok());
    /// ```
    pub fn new(
        config: AnthropicConfig,
        system_prompt: impl Into<String>,
        max_result_chars: usize,
    ) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(
                SnowAgentError::MissingCredentials("ANTHROPIC_API_KEY".to_string()).into(),
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("snow-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SnowAgentError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!("Initialized Anthropic provider: model={}", config.model);

        Ok(Self {
            client,
            config,
            system_prompt: system_prompt.into(),
            max_result_chars,
        })
    }

    fn messages_url(&self) -> String {
        let base = self
            .config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!("{}/v1/messages", base)
    }

    fn convert_tools(&self, catalog: &OperationCatalog) -> Vec<AnthropicTool> {
        catalog
            .schemas()
            .iter()
            .map(|schema| AnthropicTool {
                name: schema.operation.name().to_string(),
                description: schema.description.to_string(),
                input_schema: schema.parameters_json_schema(),
            })
            .collect()
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<AnthropicMessage> {
        let mut converted: Vec<AnthropicMessage> = Vec::new();

        for message in validate_message_sequence(messages) {
            let (role, blocks) = match message.role.as_str() {
                "tool" => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: message.tool_call_id.unwrap_or_default(),
                        content: message.content.unwrap_or_default(),
                    }],
                ),
                "assistant" => {
                    let mut blocks = Vec::new();
                    if let Some(text) = message.content.filter(|t| !t.trim().is_empty()) {
                        blocks.push(ContentBlock::Text { text });
                    }
                    for call in message.tool_calls.unwrap_or_default() {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id,
                            name: call.name,
                            input: call.arguments,
                        });
                    }
                    ("assistant", blocks)
                }
                _ => (
                    "user",
                    message
                        .content
                        .filter(|t| !t.trim().is_empty())
                        .map(|text| vec![ContentBlock::Text { text }])
                        .unwrap_or_default(),
                ),
            };

            if blocks.is_empty() {
                continue;
            }

            match converted.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => converted.push(AnthropicMessage {
                    role: role.to_string(),
                    content: blocks,
                }),
            }
        }

        converted
    }

    fn convert_response(response: MessagesResponse) -> Result<CompletionResponse> {
        let mut texts = Vec::new();
        let mut requests = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => texts.push(text),
                ContentBlock::ToolUse { id, name, input } => {
                    requests.push(OperationRequest::new(id, name, input))
                }
                other => tracing::debug!("Ignoring content block: {:?}", other),
            }
        }

        if response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(SnowAgentError::Provider(
                "Anthropic response was cut off at max_tokens".to_string(),
            )
            .into());
        }

        let text = Some(texts.join("\n")).filter(|t| !t.trim().is_empty());
        let mut completion = CompletionResponse::with_requests(text, requests);
        if completion.is_empty() {
            return Err(SnowAgentError::Provider(
                "Anthropic returned neither text nor tool use".to_string(),
            )
            .into());
        }

        if let Some(usage) = response.usage {
            completion =
                completion.with_usage(TokenUsage::new(usage.input_tokens, usage.output_tokens));
        }

        Ok(completion)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        transcript: &[Turn],
        catalog: &OperationCatalog,
    ) -> Result<CompletionResponse> {
        let messages = self.convert_messages(&lower_transcript(transcript, self.max_result_chars));
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: &self.system_prompt,
            tools: self.convert_tools(catalog),
            messages,
        };

        tracing::debug!(
            "Sending Anthropic request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Anthropic request failed: {}", e);
                SnowAgentError::Provider(format!("Anthropic request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| format!("{}: {}", e.error.kind, e.error.message))
                .unwrap_or(error_text);
            tracing::error!("Anthropic returned error {}: {}", status, detail);
            return Err(SnowAgentError::Provider(format!(
                "Anthropic returned error {}: {}",
                status, detail
            ))
            .into());
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Anthropic response: {}", e);
            SnowAgentError::Provider(format!("Failed to parse Anthropic response: {}", e))
        })?;

        tracing::debug!(
            stop_reason = ?body.stop_reason,
            blocks = body.content.len(),
            "Anthropic response received"
        );

        Self::convert_response(body)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::OperationResult;
    use serde_json::json;

    fn provider() -> AnthropicProvider {
        let config = AnthropicConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        AnthropicProvider::new(config, "system", 1000).unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = AnthropicProvider::new(AnthropicConfig::default(), "s", 10)
            .err()
            .unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_messages_url_respects_api_base() {
        let config = AnthropicConfig {
            api_key: "k".to_string(),
            api_base: Some("http://127.0.0.1:9999/".to_string()),
            ..Default::default()
        };
        let custom = AnthropicProvider::new(config, "s", 10).unwrap();
        assert_eq!(custom.messages_url(), "http://127.0.0.1:9999/v1/messages");
        assert_eq!(
            provider().messages_url(),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn test_convert_messages_merges_tool_results() {
        let provider = provider();
        let transcript = vec![
            Turn::user("check two records"),
            Turn::assistant(
                Some("Checking both.".to_string()),
                vec![
                    OperationRequest::new("t1", "get_record", json!({"table": "a", "sys_id": "1"})),
                    OperationRequest::new("t2", "get_record", json!({"table": "a", "sys_id": "2"})),
                ],
            ),
            Turn::tool_result(OperationResult::ok("t1", "get_record", json!({}))),
            Turn::tool_result(OperationResult::ok("t2", "get_record", json!({}))),
        ];
        let converted = provider.convert_messages(&lower_transcript(&transcript, 1000));

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
        assert_eq!(converted[1].content.len(), 3);
        assert!(matches!(converted[1].content[0], ContentBlock::Text { .. }));
        assert_eq!(converted[2].role, "user");
        assert_eq!(converted[2].content.len(), 2);
        assert!(matches!(
            &converted[2].content[1],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "t2"
        ));
    }

    #[test]
    fn test_convert_messages_skips_empty_assistant_text() {
        let provider = provider();
        let messages = vec![Message::user("hi"), Message::assistant("  "), Message::user("again")];
        let converted = provider.convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].content.len(), 2);
    }

    #[test]
    fn test_tool_result_follows_user_text_in_same_message() {
        let provider = provider();
        let transcript = vec![
            Turn::user("q"),
            Turn::assistant(None, vec![OperationRequest::new("t1", "get_update_sets", json!({}))]),
            Turn::cancelled(),
            Turn::user("next"),
        ];
        let converted = provider.convert_messages(&lower_transcript(&transcript, 1000));
        let roles: Vec<&str> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant", "user"]);
        assert!(matches!(converted[2].content[0], ContentBlock::ToolResult { .. }));
    }

    #[test]
    fn test_block_serialization() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: "get_record".to_string(),
            input: json!({"table": "incident"}),
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["input"]["table"], "incident");
    }

    #[test]
    fn test_convert_response_mixed_blocks() {
        let body: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_9", "name": "search_tables", "input": {"search_term": "cmdb"}},
                {"type": "thinking", "thinking": "..."}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 120, "output_tokens": 30}
        }))
        .unwrap();
        let completion = AnthropicProvider::convert_response(body).unwrap();
        assert_eq!(completion.text.as_deref(), Some("Let me look."));
        assert_eq!(completion.requests.len(), 1);
        assert_eq!(completion.requests[0].request_id, "toolu_9");
        assert_eq!(completion.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_convert_response_empty_is_error() {
        let body: MessagesResponse =
            serde_json::from_value(json!({"content": [], "stop_reason": "end_turn"})).unwrap();
        assert!(AnthropicProvider::convert_response(body).is_err());
    }

    #[test]
    fn test_convert_response_max_tokens_is_error() {
        let body: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "partial"}],
            "stop_reason": "max_tokens"
        }))
        .unwrap();
        let err = AnthropicProvider::convert_response(body).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }
}
