use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use snow_agent::agent::Turn;
use snow_agent::gateway::{Gateway, GatewayOutcome};
use snow_agent::operations::{Operation, OperationCall, OperationCatalog};
use snow_agent::providers::{CompletionResponse, Provider};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Planner replaying canned responses; answers "Done" when exhausted
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<CompletionResponse>>>,
    transcripts: Arc<Mutex<Vec<Vec<Turn>>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            transcripts: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    pub fn transcript(&self, call: usize) -> Vec<Turn> {
        self.transcripts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        transcript: &[Turn],
        _catalog: &OperationCatalog,
    ) -> snow_agent::Result<CompletionResponse> {
        self.transcripts.lock().unwrap().push(transcript.to_vec());
        Ok(self
            .responses
            .lock()
            .unwrap()
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

/// Gateway that records every call and answers from a script
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingGateway {
    outcomes: Arc<Mutex<VecDeque<GatewayOutcome>>>,
    calls: Arc<Mutex<Vec<OperationCall>>>,
}

#[allow(dead_code)]
impl RecordingGateway {
    pub fn new(outcomes: Vec<GatewayOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<OperationCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().iter().map(|c| c.operation).collect()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn invoke(&self, call: &OperationCall) -> GatewayOutcome {
        self.calls.lock().unwrap().push(call.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Value::Array(Vec::new())))
    }
}
