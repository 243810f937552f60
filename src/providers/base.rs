//! Base provider trait and common types for snow-agent
//!
//! This module defines the Provider trait that every planner backend
//! implements, the neutral message form transcripts are lowered to, and the
//! response type handed back to the agent loop.

use crate::agent::conversation::{Turn, TurnContent};
use crate::error::Result;
use crate::operations::{OperationCatalog, OperationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Text given to the planner for a request that never ran
pub const NOT_EXECUTED_RESULT: &str =
    "{\"success\": false, \"error\": {\"kind\": \"not_executed\", \"message\": \"Operation was not executed because the user cancelled the request\"}}";

/// Text given to the planner in place of a cancellation marker
pub const CANCELLED_NOTICE: &str =
    "[The user cancelled the previous request before it finished. Some operations may not have run.]";

/// Message structure for conversation
///
/// Provider-neutral form of one transcript entry. Each backend converts
/// these to its own wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, tool)
    pub role: String,
    /// Content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Optional tool calls in the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Optional tool call ID (for tool result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::providers::Message;
    ///
    /// let msg = Message::user("List my update sets");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new tool result message
    ///
    /// # Arguments
    ///
    /// * `tool_call_id` - The ID of the tool call this result corresponds to
    /// * `content` - The rendered result
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Creates an assistant message carrying tool calls and optional text
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }
}

/// A tool call as seen by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, echoed back by the matching tool result
    pub id: String,
    /// Operation name
    pub name: String,
    /// Arguments as JSON
    pub arguments: Value,
}

impl From<&OperationRequest> for ToolCall {
    fn from(request: &OperationRequest) -> Self {
        Self {
            id: request.request_id.clone(),
            name: request.operation_name.clone(),
            arguments: request.parameters.clone(),
        }
    }
}

impl From<ToolCall> for OperationRequest {
    fn from(call: ToolCall) -> Self {
        OperationRequest::new(call.id, call.name, call.arguments)
    }
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: usize,
    /// Tokens in the completion
    pub completion_tokens: usize,
    /// Sum of both
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create usage from prompt and completion counts
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// What the planner decided for one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Narrative text, if any
    pub text: Option<String>,
    /// Operations to run, in order; empty means the turn is finished
    pub requests: Vec<OperationRequest>,
    /// Token usage, if the backend reports it
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Final answer with no operations
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            requests: Vec::new(),
            usage: None,
        }
    }

    /// Response requesting operations
    pub fn with_requests(text: Option<String>, requests: Vec<OperationRequest>) -> Self {
        Self {
            text,
            requests,
            usage: None,
        }
    }

    /// Attach token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Returns true when the response ends the turn
    pub fn is_final(&self) -> bool {
        self.requests.is_empty()
    }

    /// Returns true when the response carries neither text nor requests
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
            && self
                .text
                .as_deref()
                .map_or(true, |t| t.trim().is_empty())
    }
}

/// Planner backend
///
/// A provider takes the whole transcript plus the operation catalog and
/// decides what happens next. It holds no conversation state of its own.
///
/// # Examples
///
/// ```
/// use snow_agent::agent::conversation::Turn;
/// use snow_agent::error::Result;
/// use snow_agent::operations::OperationCatalog;
/// use snow_agent::providers::{CompletionResponse, Provider};
/// use async_trait::async_trait;
///
/// struct Canned;
///
/// #[async_trait]
/// impl Provider for Canned {
///     async fn complete(
///         &self,
///         _transcript: &[Turn],
///         _catalog: &OperationCatalog,
///     ) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::text("Nothing to do"))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Decide the next step for the transcript
    ///
    /// # Errors
    ///
    /// Returns error when the backend is unreachable, rejects the request
    /// or answers with something that cannot be interpreted
    async fn complete(
        &self,
        transcript: &[Turn],
        catalog: &OperationCatalog,
    ) -> Result<CompletionResponse>;

    /// Backend name, for logs
    fn name(&self) -> &str {
        "unknown"
    }

    /// Model in use, for logs and the startup banner
    fn model(&self) -> String {
        String::new()
    }
}

/// Lower a transcript to provider-neutral messages
///
/// Every tool call in the output is followed by exactly one tool result.
/// Results whose call is not in the preceding assistant message are dropped,
/// and calls that never got a result (the turn was cancelled first) get a
/// synthetic "not executed" result. Result text is capped at
/// `max_result_chars` characters.
///
/// # Examples
///
/// ```
/// use snow_agent::agent::conversation::Turn;
/// use snow_agent::operations::OperationRequest;
/// use snow_agent::providers::lower_transcript;
/// use serde_json::json;
///
/// let transcript = vec![
///     Turn::user("how many incidents?"),
///     Turn::assistant(None, vec![OperationRequest::new("t1", "query_records", json!({}))]),
///     Turn::cancelled(),
/// ];
/// let messages = lower_transcript(&transcript, 1000);
/// assert_eq!(messages.len(), 4);
/// assert_eq!(messages[2].role, "tool");
/// ```
pub fn lower_transcript(transcript: &[Turn], max_result_chars: usize) -> Vec<Message> {
    let mut messages = Vec::with_capacity(transcript.len());
    let mut pending: Vec<String> = Vec::new();

    for turn in transcript {
        if !matches!(turn.content(), TurnContent::Result { .. }) {
            close_pending(&mut messages, &mut pending);
        }

        match turn.content() {
            TurnContent::Text { text } => messages.push(Message::user(text.clone())),
            TurnContent::Plan { text, requests } if requests.is_empty() => {
                messages.push(Message::assistant(text.clone().unwrap_or_default()));
            }
            TurnContent::Plan { text, requests } => {
                pending = requests.iter().map(|r| r.request_id.clone()).collect();
                let calls = requests.iter().map(ToolCall::from).collect();
                messages.push(Message::assistant_with_tools(text.clone(), calls));
            }
            TurnContent::Result { result } => {
                match pending.iter().position(|id| id == &result.request_id) {
                    Some(idx) => {
                        pending.remove(idx);
                        messages.push(Message::tool_result(
                            result.request_id.clone(),
                            result.to_message(max_result_chars),
                        ));
                    }
                    None => {
                        tracing::warn!(
                            "Dropping orphan tool result with request_id: {}",
                            result.request_id
                        );
                    }
                }
            }
            TurnContent::Cancelled => messages.push(Message::assistant(CANCELLED_NOTICE)),
        }
    }
    close_pending(&mut messages, &mut pending);

    messages
}

fn close_pending(messages: &mut Vec<Message>, pending: &mut Vec<String>) {
    for id in pending.drain(..) {
        messages.push(Message::tool_result(id, NOT_EXECUTED_RESULT));
    }
}

/// Drop tool messages that do not answer a known tool call
///
/// Applied by backends after their own conversions as a last guard.
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    let valid_tool_ids: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == "assistant")
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|call| call.id.as_str())
        .collect();

    messages
        .iter()
        .filter(|message| {
            if message.role != "tool" {
                return true;
            }
            match &message.tool_call_id {
                Some(id) if valid_tool_ids.contains(id.as_str()) => true,
                Some(id) => {
                    tracing::warn!("Dropping orphan tool message with tool_call_id: {}", id);
                    false
                }
                None => {
                    tracing::warn!("Dropping tool message without tool_call_id");
                    false
                }
            }
        })
        .cloned()
        .collect()
}
