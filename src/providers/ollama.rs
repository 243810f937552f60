//! Ollama provider implementation for snow-agent
//!
//! This module implements the Provider trait for Ollama, connecting to a
//! local or remote Ollama server through `/api/chat` with tool calling.

use crate::agent::conversation::Turn;
use crate::config::OllamaConfig;
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

/// Ollama API provider
///
/// # Examples
///
/// ```
/// use snow_agent::config::OllamaConfig;
/// use snow_agent::providers::OllamaProvider;
///
/// let config = OllamaConfig {
///     host: "http://localhost:11434".to_string(),
///     model: "llama3.2:latest".to_string(),
/// };
/// let provider = OllamaProvider::new(config, "You configure ServiceNow.", 20_000);
/// assert!(provider.is_ok());
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    system_prompt: String,
    max_result_chars: usize,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Tool definition for Ollama
#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

/// Function definition for Ollama tools
#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: OllamaFunctionCall,
}

/// Function call details in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// Response structure from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Arguments
    ///
    /// * `config` - Ollama host and model
    /// * `system_prompt` - Instructions sent ahead of every transcript
    /// * `max_result_chars` - Cap on each rendered operation result
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(
        config: OllamaConfig,
        system_prompt: impl Into<String>,
        max_result_chars: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("snow-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SnowAgentError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config,
            system_prompt: system_prompt.into(),
            max_result_chars,
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        let mut converted = vec![OllamaMessage {
            role: "system".to_string(),
            content: self.system_prompt.clone(),
            tool_calls: None,
        }];

        converted.extend(validate_message_sequence(messages).into_iter().map(|m| {
            let tool_calls = m.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|tc| OllamaToolCall {
                        id: tc.id,
                        r#type: default_tool_type(),
                        function: OllamaFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect()
            });

            OllamaMessage {
                role: m.role,
                content: m.content.unwrap_or_default(),
                tool_calls,
            }
        }));

        converted
    }

    fn convert_tools(&self, catalog: &OperationCatalog) -> Vec<OllamaTool> {
        catalog
            .schemas()
            .iter()
            .map(|schema| OllamaTool {
                r#type: "function".to_string(),
                function: OllamaFunction {
                    name: schema.operation.name().to_string(),
                    description: schema.description.to_string(),
                    parameters: schema.parameters_json_schema(),
                },
            })
            .collect()
    }

    fn convert_response(&self, ollama_msg: OllamaMessage) -> CompletionResponse {
        let requests: Vec<OperationRequest> = ollama_msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let id = if tc.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    tc.id
                };
                OperationRequest::new(id, tc.function.name, tc.function.arguments)
            })
            .collect();

        let text = Some(ollama_msg.content).filter(|c| !c.trim().is_empty());
        CompletionResponse::with_requests(text, requests)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        transcript: &[Turn],
        catalog: &OperationCatalog,
    ) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let messages = lower_transcript(transcript, self.max_result_chars);

        let ollama_request = OllamaRequest {
            model: self.config.model.clone(),
            messages: self.convert_messages(&messages),
            tools: self.convert_tools(catalog),
            stream: false,
        };

        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                SnowAgentError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(SnowAgentError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            SnowAgentError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let mut completion = self.convert_response(ollama_response.message);
        if completion.is_empty() {
            return Err(SnowAgentError::Provider(
                "Ollama returned neither text nor tool calls".to_string(),
            )
            .into());
        }

        if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0 {
            completion = completion.with_usage(TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            ));
        }

        Ok(completion)
    }

    fn name(&self) -> &str {
        "ollama"
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

    fn provider() -> OllamaProvider {
        OllamaProvider::new(OllamaConfig::default(), "system", 1000).unwrap()
    }

    #[test]
    fn test_ollama_provider_creation() {
        let provider = provider();
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3.2:latest");
    }

    #[test]
    fn test_convert_messages_prepends_system_prompt() {
        let provider = provider();
        let transcript = vec![
            Turn::user("list scopes"),
            Turn::assistant(
                None,
                vec![OperationRequest::new("c1", "get_application_scopes", json!({}))],
            ),
            Turn::tool_result(OperationResult::ok("c1", "get_application_scopes", json!([]))),
        ];
        let converted = provider.convert_messages(&lower_transcript(&transcript, 1000));

        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[0].content, "system");
        assert_eq!(converted[1].role, "user");
        let calls = converted[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_application_scopes");
        assert_eq!(converted[3].role, "tool");
    }

    #[test]
    fn test_convert_tools_uses_catalog() {
        let provider = provider();
        let tools = provider.convert_tools(&OperationCatalog::servicenow());
        assert_eq!(tools.len(), 9);
        assert_eq!(tools[0].r#type, "function");
        assert_eq!(tools[0].function.name, "query_records");
    }

    #[test]
    fn test_convert_response_assigns_missing_ids() {
        let provider = provider();
        let msg = OllamaMessage {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: Some(vec![OllamaToolCall {
                id: String::new(),
                r#type: "function".to_string(),
                function: OllamaFunctionCall {
                    name: "search_tables".to_string(),
                    arguments: json!({"search_term": "incident"}),
                },
            }]),
        };
        let completion = provider.convert_response(msg);
        assert!(completion.text.is_none());
        assert_eq!(completion.requests.len(), 1);
        assert!(completion.requests[0].request_id.starts_with("call_"));
        assert_eq!(completion.requests[0].operation_name, "search_tables");
    }

    #[test]
    fn test_convert_response_text_only() {
        let provider = provider();
        let msg = OllamaMessage {
            role: "assistant".to_string(),
            content: "All done.".to_string(),
            tool_calls: None,
        };
        let completion = provider.convert_response(msg);
        assert!(completion.is_final());
        assert_eq!(completion.text.as_deref(), Some("All done."));
    }
}
