//! Test utilities for snow-agent
//!
//! This module provides a scripted planner, configuration fixtures and
//! assertion helpers shared by unit tests.

use crate::agent::Turn;
use crate::config::Config;
use crate::error::{Result, SnowAgentError};
use crate::operations::OperationCatalog;
use crate::providers::{CompletionResponse, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ScriptState {
    responses: VecDeque<CompletionResponse>,
    failure: Option<String>,
    transcript_lengths: Vec<usize>,
}

/// Planner that replays a fixed list of responses
///
/// Clones share the same script, so a test can keep a handle after moving
/// one into an agent. Once the script runs out every call answers "Done".
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    /// Create a provider that answers with `responses` in order
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                responses: responses.into(),
                ..Default::default()
            })),
        }
    }

    /// Create a provider whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                failure: Some(message.into()),
                ..Default::default()
            })),
        }
    }

    /// Number of planner calls so far
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().transcript_lengths.len()
    }

    /// Transcript length seen by each call, in order
    pub fn transcript_lengths(&self) -> Vec<usize> {
        self.state.lock().unwrap().transcript_lengths.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        transcript: &[Turn],
        _catalog: &OperationCatalog,
    ) -> Result<CompletionResponse> {
        let mut state = self.state.lock().unwrap();
        state.transcript_lengths.push(transcript.len());

        if let Some(message) = &state.failure {
            return Err(SnowAgentError::Provider(message.clone()).into());
        }

        Ok(state
            .responses
            .pop_front()
            .unwrap_or_else(|| CompletionResponse::text("Done")))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with credentials filled in
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.servicenow.instance = "dev12345".to_string();
    config.servicenow.username = "admin".to_string();
    config.servicenow.password = "secret".to_string();
    config.provider.anthropic.api_key = "sk-test".to_string();
    config
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
servicenow:
  instance: dev12345
  username: admin
  timeout_seconds: 15

provider:
  type: ollama
  max_result_chars: 5000
  ollama:
    host: http://localhost:11434
    model: llama3.2:latest

agent:
  max_rounds: 10
  show_operations: false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_replays_then_done() {
        let provider = ScriptedProvider::new(vec![CompletionResponse::text("first")]);
        let catalog = OperationCatalog::servicenow();

        let first = provider.complete(&[], &catalog).await.unwrap();
        let second = provider.complete(&[], &catalog).await.unwrap();

        assert_eq!(first.text.as_deref(), Some("first"));
        assert_eq!(second.text.as_deref(), Some("Done"));
        assert_eq!(provider.clone().call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = ScriptedProvider::failing("offline");
        let result = provider
            .complete(&[], &OperationCatalog::servicenow())
            .await;
        assert_error_contains(result, "offline");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<()> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    fn test_test_config() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn test_test_config_yaml() {
        let yaml = test_config_yaml();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.agent.max_rounds, 10);
        assert!(config.validate().is_ok());
    }
}
