//! Provider module for snow-agent
//!
//! This module contains the planner abstraction and its implementations
//! for the Anthropic Messages API and Ollama.

pub mod anthropic;
pub mod base;
pub mod ollama;

pub use anthropic::AnthropicProvider;
pub use base::{
    lower_transcript, validate_message_sequence, CompletionResponse, Message, Provider,
    TokenUsage, ToolCall,
};
pub use ollama::OllamaProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, SnowAgentError};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration; `provider_type` selects the backend
/// * `system_prompt` - Instructions sent with every planner call
///
/// # Returns
///
/// Returns a boxed provider instance
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(
    config: &ProviderConfig,
    system_prompt: impl Into<String>,
) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(
            config.anthropic.clone(),
            system_prompt,
            config.max_result_chars,
        )?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(
            config.ollama.clone(),
            system_prompt,
            config.max_result_chars,
        )?)),
        other => Err(SnowAgentError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
