//! snow-agent - conversational ServiceNow configuration agent
//!
//! This library provides the core functionality for snow-agent: the
//! plan/dispatch loop, the operation catalog, the ServiceNow Table API
//! gateway, planner backends, and configuration.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Conversation log, the per-turn loop, and turn metrics
//! - `operations`: Operation names, parameter schemas, and results
//! - `gateway`: The remote-execution seam and its ServiceNow implementation
//! - `providers`: Planner abstraction and implementations (Anthropic, Ollama)
//! - `prompts`: System prompt carrying platform knowledge
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers for the CLI commands
//!
//! # Example
//!
//! ```no_run
//! use snow_agent::{Agent, Config, ServiceNowClient};
//! use snow_agent::providers::create_provider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     config.require_credentials()?;
//!
//!     let client = ServiceNowClient::new(&config.servicenow)?;
//!     let prompt = snow_agent::prompts::build_system_prompt("dev12345");
//!     let provider = create_provider(&config.provider, prompt)?;
//!     let mut agent = Agent::new_boxed(provider, Box::new(client), config.agent.clone())?;
//!
//!     let answer = agent.process_turn("List the in-progress update sets").await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod operations;
pub mod prompts;
pub mod providers;

// Re-export commonly used types
pub use agent::{Agent, FinalAnswer, TurnOutcome};
pub use config::Config;
pub use error::{Result, SnowAgentError};
pub use gateway::{Gateway, ServiceNowClient};
pub use operations::{Operation, OperationCatalog, OperationRequest, OperationResult};

#[cfg(test)]
pub mod test_utils;
