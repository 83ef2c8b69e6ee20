//! Special commands parser for interactive chat mode
//!
//! Special commands let the user manage conversations without leaving the
//! chat session:
//! - Create, list, switch, rename and delete conversations
//! - Print the current conversation's history
//! - Display help information
//! - Exit the session
//!
//! Commands are prefixed with `/`. The command word is case-insensitive;
//! arguments keep their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },

    /// Command takes no argument but got one
    #[error("Command {command} takes no argument, got: {arg}")]
    UnexpectedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the conversation store instead of being sent to
/// the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Create a conversation (optionally titled) and switch to it
    New(Option<String>),

    /// List conversations
    List,

    /// Switch to the conversation with this id or id prefix
    Switch(String),

    /// Rename the current conversation
    Rename(String),

    /// Delete the current conversation
    Delete,

    /// Print the current conversation's messages
    History,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the model as a regular message.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is
/// not a valid command, `CommandError::MissingArgument` when a required
/// argument is absent, and `CommandError::UnexpectedArgument` when a
/// command that takes none gets one.
///
/// # Examples
///
/// ```
/// use aio_chat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/rename Tax Questions").unwrap();
/// assert_eq!(cmd, SpecialCommand::Rename("Tax Questions".to_string()));
///
/// let cmd = parse_special_command("hello there").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };
    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    match word.as_str() {
        "/new" => Ok(SpecialCommand::New(argument)),
        "/list" | "/ls" => without_argument(&word, &argument, SpecialCommand::List),
        "/switch" | "/select" => argument.map(SpecialCommand::Switch).ok_or_else(|| {
            CommandError::MissingArgument {
                command: "/switch".to_string(),
                usage: "/switch <id>".to_string(),
            }
        }),
        "/rename" => argument.map(SpecialCommand::Rename).ok_or_else(|| {
            CommandError::MissingArgument {
                command: "/rename".to_string(),
                usage: "/rename <title>".to_string(),
            }
        }),
        "/delete" => without_argument(&word, &argument, SpecialCommand::Delete),
        "/history" => without_argument(&word, &argument, SpecialCommand::History),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn without_argument(
    word: &str,
    argument: &Option<String>,
    command: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    match argument {
        Some(arg) => Err(CommandError::UnexpectedArgument {
            command: word.to_string(),
            arg: arg.clone(),
        }),
        None => Ok(command),
    }
}

/// Print help for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CONVERSATIONS:
  /new [title]    - Start a new conversation and switch to it
  /list           - List conversations (current one marked with *)
  /switch <id>    - Switch to a conversation (id or unique prefix)
  /rename <title> - Rename the current conversation
  /delete         - Delete the current conversation
  /history        - Show the messages of the current conversation

SESSION:
  /help           - Show this help message
  /exit           - Exit the session (also: exit, quit, Ctrl-D)

Anything else is sent to the model as a message.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_special_command("what is a lease?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_exit_aliases() {
        for input in ["exit", "QUIT", "/exit", "/quit"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_new_with_and_without_title() {
        assert_eq!(
            parse_special_command("/new").unwrap(),
            SpecialCommand::New(None)
        );
        assert_eq!(
            parse_special_command("/NEW  Contract review ").unwrap(),
            SpecialCommand::New(Some("Contract review".to_string()))
        );
    }

    #[test]
    fn test_switch_requires_id() {
        assert_eq!(
            parse_special_command("/switch 01HX").unwrap(),
            SpecialCommand::Switch("01HX".to_string())
        );
        assert!(matches!(
            parse_special_command("/switch"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_rename_keeps_argument_case() {
        assert_eq!(
            parse_special_command("/rename My Title").unwrap(),
            SpecialCommand::Rename("My Title".to_string())
        );
        assert!(parse_special_command("/rename   ").is_err());
    }

    #[test]
    fn test_delete_rejects_argument() {
        assert_eq!(
            parse_special_command("/delete").unwrap(),
            SpecialCommand::Delete
        );
        assert!(matches!(
            parse_special_command("/delete now"),
            Err(CommandError::UnexpectedArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_special_command("/frobnicate"),
            Err(CommandError::UnknownCommand("/frobnicate".to_string()))
        );
    }

    #[test]
    fn test_help_and_history() {
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
        assert_eq!(
            parse_special_command("/history").unwrap(),
            SpecialCommand::History
        );
        assert_eq!(parse_special_command("/ls").unwrap(), SpecialCommand::List);
    }
}
