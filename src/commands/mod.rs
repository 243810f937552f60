/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat`: Interactive session against the instance
- `run`: Execute a single request and exit
- `ping`: Check the connection and report in-progress update sets

All of them connect to the instance first and fail fast if the
credentials are missing or the connection test is rejected.
*/

use crate::agent::{Agent, AgentEvent, Conversation, FinalAnswer, Role, TurnOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::gateway::ServiceNowClient;
use crate::operations::Operation;
use crate::prompts::build_system_prompt;
use crate::providers::create_provider;
use colored::Colorize;
use serde_json::Value;

// Special commands parser for the interactive session
pub mod special_commands;

/// Longest parameter summary printed for an operation
const OPERATION_SUMMARY_CHARS: usize = 120;

/// Longest result excerpt printed for an operation
const RESULT_SUMMARY_CHARS: usize = 400;

/// Number of in-progress update sets listed at startup
const UPDATE_SETS_SHOWN: usize = 3;

/// Connect to the instance and print the startup report
///
/// Checks credentials, runs the connection test and lists up to three
/// in-progress update sets.
///
/// # Errors
///
/// Returns `SnowAgentError::MissingCredentials` when required values are not
/// configured, or the remote error when the connection test fails.
pub async fn connect(config: &Config) -> Result<ServiceNowClient> {
    config.require_credentials()?;
    let client = ServiceNowClient::new(&config.servicenow)?;

    println!(
        "{}",
        format!(
            "Connecting to {} as {}...",
            client.base_url(),
            config.servicenow.username
        )
        .blue()
    );

    let users = client
        .test_connection()
        .await
        .map_err(|failure| failure.to_error("test_connection"))?;
    let display_name = users
        .as_array()
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(config.servicenow.username.as_str());
    println!("{}", format!("Connected as: {}", display_name).green());

    match client.get_update_sets("in progress", 5).await {
        Ok(sets) => {
            let names = update_set_names(&sets);
            if !names.is_empty() {
                println!(
                    "{}",
                    format!("In-progress update sets: {}", names.join(", ")).blue()
                );
            }
        }
        Err(failure) => tracing::warn!("Could not list update sets: {}", failure),
    }

    Ok(client)
}

/// Build an agent for `config` on top of a connected client
pub fn build_agent(config: &Config, client: ServiceNowClient) -> Result<Agent> {
    let prompt = build_system_prompt(&config.servicenow.instance_name());
    let provider = create_provider(&config.provider, prompt)?;
    let agent = Agent::new_boxed(provider, Box::new(client), config.agent.clone())?;
    tracing::info!(
        provider = agent.provider().name(),
        model = %agent.provider().model(),
        "Planner ready"
    );

    if config.agent.show_operations {
        Ok(agent.with_observer(print_event))
    } else {
        Ok(agent)
    }
}

fn update_set_names(sets: &Value) -> Vec<String> {
    sets.as_array()
        .map(|rows| {
            rows.iter()
                .take(UPDATE_SETS_SHOWN)
                .map(|row| {
                    row.get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// One-line summary of the session log for the `history` command
fn history_summary(conversation: &Conversation) -> String {
    let Some(first) = conversation.turns().first() else {
        return "Conversation is empty.".to_string();
    };
    format!(
        "Conversation has {} turns since {}: {} requests, {} planner replies, {} operation results.",
        conversation.len(),
        first.recorded_at().format("%H:%M:%S"),
        conversation.count_by_role(Role::User),
        conversation.count_by_role(Role::Assistant),
        conversation.count_by_role(Role::ToolResult),
    )
}

/// Progress tag for an operation; writes stand out from reads
fn operation_tag(operation_name: &str) -> &'static str {
    match Operation::from_name(operation_name) {
        Some(op) if op.is_mutation() => "[write]",
        _ => "[op]",
    }
}

/// Print operation progress lines
fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::PlannerNote { text, .. } => {
            println!("\n{}", text);
        }
        AgentEvent::OperationStarted { request, .. } => {
            let tag = operation_tag(&request.operation_name);
            let tag = if tag == "[op]" { tag.cyan() } else { tag.yellow() };
            println!(
                "  {} {}({})",
                tag,
                request.operation_name,
                summarize(&request.parameters.to_string(), OPERATION_SUMMARY_CHARS)
            );
        }
        AgentEvent::OperationFinished { result, .. } => match result.failure() {
            None => {
                let count = result.payload.as_array().map(Vec::len);
                let line = match count {
                    Some(n) => format!("{} record(s)", n),
                    None => summarize(&result.payload.to_string(), RESULT_SUMMARY_CHARS),
                };
                println!("  {} {}", "[result]".green(), line);
            }
            Some(failure) => {
                println!(
                    "  {} {}",
                    "[error]".red(),
                    summarize(&failure.to_string(), RESULT_SUMMARY_CHARS)
                );
            }
        },
        AgentEvent::RoundStarted { .. } | AgentEvent::TurnFinished { .. } => {}
    }
}

/// Print the final answer for a turn
fn print_answer(answer: &FinalAnswer) {
    match &answer.outcome {
        TurnOutcome::Completed => println!("\n{}\n", answer.text),
        TurnOutcome::RoundLimitExceeded { limit } => {
            println!("\n{}\n", answer.text);
            println!(
                "{}",
                format!("Stopped after {} planning rounds without finishing.", limit).yellow()
            );
        }
        TurnOutcome::PlannerUnavailable { .. } => eprintln!("\n{}\n", answer.text.red()),
        TurnOutcome::Cancelled => println!("\n{}\n", answer.text.yellow()),
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Connects, builds the agent and runs a readline loop. Ctrl-C while a
    //! request is running cancels it; Ctrl-C at the prompt leaves.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use tokio_util::sync::CancellationToken;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::commands::chat;
    /// use snow_agent::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default()).await?;
    /// ```
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let client = connect(&config).await?;
        let mut agent = build_agent(&config, client)?;
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner();

        loop {
            match rl.readline("You> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Clear) => {
                            agent.reset();
                            println!("{}", "Conversation cleared.".blue());
                            continue;
                        }
                        Ok(SpecialCommand::History) => {
                            println!("{}", history_summary(agent.conversation()));
                            continue;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {}
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;

                    let cancel = CancellationToken::new();
                    let watcher = {
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if tokio::signal::ctrl_c().await.is_ok() {
                                cancel.cancel();
                            }
                        })
                    };

                    let result = agent.process_turn_with_cancel(trimmed, &cancel).await;
                    watcher.abort();

                    match result {
                        Ok(answer) => print_answer(&answer),
                        Err(e) => eprintln!("{}\n", format!("Error: {}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome_banner() {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║            snow-agent: ServiceNow configuration agent        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("{}", "Ready. Describe what you want to configure.".green());
        println!("Type 'help' for available commands, 'exit' to quit\n");
    }
}

pub mod r#run {
    //! One-shot request handler.

    use super::*;

    /// Run a single request and print the answer
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `task` - The request text
    ///
    /// # Errors
    ///
    /// Returns an error if the task is blank, startup fails, or the turn
    /// ends without completing (round limit, planner failure).
    pub async fn run_task(config: Config, task: String) -> Result<()> {
        tracing::info!("Starting one-shot task");

        if task.trim().is_empty() {
            return Err(crate::error::SnowAgentError::InvalidInput(
                "task must not be empty".to_string(),
            )
            .into());
        }

        let client = connect(&config).await?;
        let mut agent = build_agent(&config, client)?;

        println!("\nTask: {}\n", task.trim());
        let answer = agent.process_turn(&task).await?;
        print_answer(&answer);

        match answer.outcome.to_error() {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

}

pub mod ping {
    //! Connection check handler.

    use super::*;

    /// Test the connection and print the startup report
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or the connection fails.
    pub async fn run_ping(config: Config) -> Result<()> {
        tracing::info!("Checking connection");
        connect(&config).await?;
        println!("{}", "Connection OK".green());
        Ok(())
    }
}
