//! Error types for snow-agent
//!
//! This module defines the error types used throughout the application,
//! using `thiserror` for ergonomic error handling.
//!
//! Only a handful of these ever escape the agent loop. Schema violations and
//! remote failures are carried as data (see [`crate::operations::Failure`]) so
//! the planner can react to them; planner outages, round limits and
//! cancellations are reported through [`crate::agent::TurnOutcome`].

use thiserror::Error;

/// Main error type for snow-agent operations
#[derive(Error, Debug)]
pub enum SnowAgentError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential or instance setting is absent
    #[error("Missing required environment variables: {0}")]
    MissingCredentials(String),

    /// The user turn was empty or otherwise unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation parameters did not match the catalog schema
    #[error("Schema validation failed for '{operation}': {message}")]
    SchemaValidation {
        /// Operation whose parameters were rejected
        operation: String,
        /// Description of every violation found
        message: String,
    },

    /// The remote instance rejected or failed a call
    #[error("Gateway error ({kind}): {message}")]
    Gateway {
        /// Failure classification (auth, network, ...)
        kind: String,
        /// Remote or transport error message
        message: String,
    },

    /// Planner backend could not be reached or answered with garbage
    #[error("Planner unavailable: {0}")]
    PlannerUnavailable(String),

    /// Agent hit the configured round ceiling
    #[error("Round limit exceeded: limit={limit}")]
    RoundLimitExceeded {
        /// The configured round ceiling
        limit: usize,
    },

    /// User interrupted the running turn
    #[error("Cancelled by user")]
    CancelledByUser,

    /// Planner backend errors (HTTP status, protocol mismatch, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Line editor errors in interactive mode
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

/// Result type alias for snow-agent operations
///
/// Uses `anyhow::Error` so call sites can attach context while still
/// allowing `downcast_ref::<SnowAgentError>()` where the kind matters.
pub type Result<T> = anyhow::Result<T>;
