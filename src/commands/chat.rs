//! Interactive chat mode handler.
//!
//! Runs a readline loop on the selected conversation: plain lines are sent
//! to the model and the reply is streamed back, slash commands manage the
//! conversation list.

use super::chats::{print_conversation_table, print_messages, short_id};
use super::send::exchange;
use super::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{ChatError, Result};
use crate::storage::KeyValueStore;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Global configuration
/// * `model` - Model override for every message of the session
/// * `roles` - Areas of expertise sent with every message
pub async fn run_chat(config: &Config, model: Option<String>, roles: Vec<String>) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let mut store = super::open_store(config)?;
    let gateway = super::build_gateway(config)?;
    let model = model.unwrap_or_default();

    let mut rl = DefaultEditor::new().map_err(ChatError::Readline)?;
    print_welcome(&store, &model, &roles);
    let log_view = store.subscribe_to_messages(print_messages);

    loop {
        let prompt = format_prompt(&store);
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed).map_err(ChatError::Readline)?;

                match parse_special_command(trimmed) {
                    Ok(SpecialCommand::None) => {}
                    Ok(SpecialCommand::Exit) => break,
                    Ok(command) => {
                        if let Err(e) = handle_special_command(&mut store, command) {
                            eprintln!("{}", e.to_string().red());
                        }
                        continue;
                    }
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                }

                let Some(conversation_id) = store.selected_conversation_id() else {
                    continue;
                };

                let mut stdout = std::io::stdout();
                match exchange(
                    &mut store,
                    &gateway,
                    &conversation_id,
                    trimmed,
                    &model,
                    &roles,
                    &mut stdout,
                )
                .await
                {
                    Ok(_) => println!("\n"),
                    Err(e) => {
                        println!();
                        eprintln!("{}", super::describe_error(&e).red());
                    }
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

    log_view.unsubscribe();
    tracing::info!("Chat session ended");
    Ok(())
}

/// Apply a slash command to the store
///
/// Switching or deleting changes the selection; the new conversation's
/// log reaches message observers of the store rather than being printed
/// here.
///
/// # Errors
///
/// Returns storage errors and unknown or ambiguous conversation ids
pub fn handle_special_command<S: KeyValueStore>(
    store: &mut ConversationStore<S>,
    command: SpecialCommand,
) -> Result<()> {
    match command {
        SpecialCommand::New(title) => {
            let created = store.create_conversation(title.as_deref())?;
            println!("{}", format!("Started {}", created.title).green());
        }
        SpecialCommand::List => print_conversation_table(&store.list_conversations()),
        SpecialCommand::Switch(prefix) => {
            let id = store.resolve_id(&prefix)?;
            store.select_conversation(&id)?;
            if let Some(selected) = store.selected_conversation() {
                println!(
                    "{}",
                    format!("Switched to {} ({})", selected.title, short_id(&id)).green()
                );
            }
        }
        SpecialCommand::Rename(title) => {
            if let Some(id) = store.selected_conversation_id() {
                store.rename_conversation(&id, &title)?;
                println!("{}", format!("Renamed to {}", title.trim()).green());
            }
        }
        SpecialCommand::Delete => {
            if let Some(id) = store.selected_conversation_id() {
                store.delete_conversation(&id)?;
                if let Some(selected) = store.selected_conversation() {
                    println!(
                        "{}",
                        format!("Deleted. Now in {}", selected.title).green()
                    );
                }
            }
        }
        SpecialCommand::History => {
            if let Some(id) = store.selected_conversation_id() {
                print_messages(&store.get_messages(&id));
            }
        }
        SpecialCommand::Help => print_help(),
        SpecialCommand::Exit | SpecialCommand::None => {}
    }
    Ok(())
}

fn format_prompt<S: KeyValueStore>(store: &ConversationStore<S>) -> String {
    let title = store
        .selected_conversation()
        .map(|c| c.title)
        .unwrap_or_default();
    format!("[{}] >> ", title.cyan())
}

fn print_welcome<S: KeyValueStore>(store: &ConversationStore<S>, model: &str, roles: &[String]) {
    println!("{}", "aio-chat interactive mode".bold());
    if !model.is_empty() {
        println!("Model: {}", model.cyan());
    }
    if !roles.is_empty() {
        println!("Roles: {}", roles.join(", ").cyan());
    }
    println!(
        "{} conversations stored. Type {} for commands.\n",
        store.list_conversations().len(),
        "/help".cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MessageLogEntry;
    use crate::storage::MemoryStore;
    use std::sync::{Arc, Mutex};

    fn store() -> ConversationStore<MemoryStore> {
        ConversationStore::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_new_then_switch_back() {
        let mut store = store();
        let first = store.selected_conversation_id().unwrap();

        handle_special_command(&mut store, SpecialCommand::New(Some("Second".into()))).unwrap();
        assert_eq!(store.selected_conversation().unwrap().title, "Second");

        handle_special_command(&mut store, SpecialCommand::Switch(first[..16].to_string()))
            .unwrap();
        assert_eq!(store.selected_conversation_id().unwrap(), first);
    }

    #[test]
    fn test_rename_applies_to_selected() {
        let mut store = store();
        handle_special_command(&mut store, SpecialCommand::Rename("  Taxes  ".into())).unwrap();
        assert_eq!(store.selected_conversation().unwrap().title, "Taxes");
    }

    #[test]
    fn test_delete_selects_remaining() {
        let mut store = store();
        let first = store.selected_conversation_id().unwrap();
        store.create_conversation(Some("Second")).unwrap();

        handle_special_command(&mut store, SpecialCommand::Delete).unwrap();
        assert_eq!(store.list_conversations().len(), 1);
        assert_eq!(store.selected_conversation_id().unwrap(), first);
    }

    #[test]
    fn test_switch_to_unknown_prefix_fails() {
        let mut store = store();
        let before = store.selected_conversation_id();
        assert!(handle_special_command(&mut store, SpecialCommand::Switch("nope".into())).is_err());
        assert_eq!(store.selected_conversation_id(), before);
    }

    #[test]
    fn test_switch_and_delete_reach_message_observers() {
        let mut store = store();
        let first = store.selected_conversation_id().unwrap();
        store
            .append_message(&first, MessageLogEntry::user("from first"))
            .unwrap();
        store.create_conversation(Some("Second")).unwrap();

        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let view = store.subscribe_to_messages(move |messages| {
            let contents = messages.iter().map(|m| m.content.clone()).collect();
            sink.lock().unwrap().push(contents);
        });

        handle_special_command(&mut store, SpecialCommand::Switch(first[..16].to_string()))
            .unwrap();
        handle_special_command(&mut store, SpecialCommand::Delete).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], vec!["from first".to_string()]);
        assert!(seen[2].is_empty());
        assert!(view.unsubscribe());
    }

    #[test]
    fn test_history_does_not_mutate() {
        let mut store = store();
        let id = store.selected_conversation_id().unwrap();
        store
            .append_message(&id, MessageLogEntry::user("hi"))
            .unwrap();
        handle_special_command(&mut store, SpecialCommand::History).unwrap();
        assert_eq!(store.get_messages(&id).len(), 1);
    }
}
