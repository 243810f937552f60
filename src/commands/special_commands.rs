//! Special commands parser for interactive chat mode
//!
//! A few inputs are handled by the REPL itself instead of being sent to the
//! agent: clearing the conversation, showing its size, help, and exit.
//! Commands are case-insensitive and may be written with or without a
//! leading `/`.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it does not take
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Drop the conversation and start fresh
    Clear,

    /// Show how many turns the conversation holds
    History,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the agent as a request.
    None,
}

/// Parse a user input string into a special command
///
/// Bare words (`clear`, `history`, `help`, `exit`, `quit`, `q`) are only
/// recognised when they are the whole input, so a request such as
/// "clear the description on INC0010001" still goes to the agent.
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is not
/// a known command, and `CommandError::UnsupportedArgument` if a known
/// command is followed by an argument.
///
/// # Examples
///
/// ```
/// use snow_agent::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("clear").unwrap(), SpecialCommand::Clear);
/// assert_eq!(parse_special_command("/quit").unwrap(), SpecialCommand::Exit);
/// assert_eq!(
///     parse_special_command("list my update sets").unwrap(),
///     SpecialCommand::None
/// );
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let lower = input.trim().to_lowercase();

    let (word, slashed) = match lower.strip_prefix('/') {
        Some(rest) => (rest, true),
        None => (lower.as_str(), false),
    };

    let mut parts = word.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let command = match name {
        "clear" | "reset" => SpecialCommand::Clear,
        "history" => SpecialCommand::History,
        "help" | "?" => SpecialCommand::Help,
        "exit" | "quit" | "q" => SpecialCommand::Exit,
        _ if slashed => return Err(CommandError::UnknownCommand(format!("/{}", name))),
        _ => return Ok(SpecialCommand::None),
    };

    if arg.is_empty() {
        Ok(command)
    } else if slashed {
        Err(CommandError::UnsupportedArgument {
            command: format!("/{}", name),
            arg: arg.to_string(),
        })
    } else {
        // plain text that merely starts with a command word
        Ok(SpecialCommand::None)
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands
================

  clear, /clear     - Forget the conversation and start over
  history, /history - Show how many turns the conversation holds
  help, /help       - Show this help
  exit, quit, q     - Leave the session

Anything else is sent to the agent as a request, for example:
  Add a 'Customer Priority' choice field to incident with values Low/Medium/High
  Show me all business rules on the incident table

Press Ctrl-C while the agent is working to cancel the current request.
Operations that already ran are not rolled back.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_words() {
        assert_eq!(parse_special_command("clear").unwrap(), SpecialCommand::Clear);
        assert_eq!(
            parse_special_command("HISTORY").unwrap(),
            SpecialCommand::History
        );
        assert_eq!(parse_special_command(" help ").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("q").unwrap(), SpecialCommand::Exit);
        assert_eq!(parse_special_command("quit").unwrap(), SpecialCommand::Exit);
    }

    #[test]
    fn test_slashed_commands() {
        assert_eq!(parse_special_command("/clear").unwrap(), SpecialCommand::Clear);
        assert_eq!(parse_special_command("/reset").unwrap(), SpecialCommand::Clear);
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("/exit").unwrap(), SpecialCommand::Exit);
    }

    #[test]
    fn test_requests_are_not_commands() {
        assert_eq!(
            parse_special_command("clear the short description on INC0010001").unwrap(),
            SpecialCommand::None
        );
        assert_eq!(
            parse_special_command("show business rules").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_unknown_slash_command() {
        let err = parse_special_command("/mode write").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/mode".to_string()));
        assert!(err.to_string().contains("/help"));
    }

    #[test]
    fn test_slash_command_with_argument() {
        let err = parse_special_command("/clear all").unwrap_err();
        assert_eq!(
            err,
            CommandError::UnsupportedArgument {
                command: "/clear".to_string(),
                arg: "all".to_string()
            }
        );
    }
}
