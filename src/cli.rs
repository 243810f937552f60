//! Command-line interface definition for snow-agent
//!
//! This module defines the CLI structure using clap's derive API:
//! an interactive chat session (the default), a one-shot task runner and a
//! connection check.

use clap::{Parser, Subcommand};

/// snow-agent - conversational ServiceNow configuration agent
///
/// Describe what you want configured in plain language; the agent plans and
/// executes the Table API calls needed to do it.
#[derive(Parser, Debug, Clone)]
#[command(name = "snow-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the per-turn round ceiling
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// Command to execute (defaults to `chat`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for snow-agent
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive session
    Chat,

    /// Run a single request and exit
    Run {
        /// The request, in plain language
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        task: Vec<String>,
    },

    /// Check the instance connection and list in-progress update sets
    Ping,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Configuration file path, falling back to the default location
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or("config/config.yaml")
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            max_rounds: None,
            command: None,
        }
    }
}
