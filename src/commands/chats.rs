use crate::cli::ChatsCommand;
use crate::config::Config;
use crate::conversation::{Conversation, ConversationStore, MessageLogEntry, Role};
use crate::error::{ChatError, Result};
use crate::storage::KeyValueStore;
use colored::Colorize;
use prettytable::{format, Table};

/// Number of id characters shown in tables
const SHORT_ID_LEN: usize = 8;

/// Handle conversation management commands
pub fn handle_chats(config: &Config, command: ChatsCommand) -> Result<()> {
    let mut store = super::open_store(config)?;
    apply_chats_command(&mut store, command)
}

/// Run `command` against an open store
pub fn apply_chats_command<S: KeyValueStore>(
    store: &mut ConversationStore<S>,
    command: ChatsCommand,
) -> Result<()> {
    match command {
        ChatsCommand::List { json } => {
            let conversations = store.list_conversations();
            if json {
                let json = serde_json::to_string_pretty(&conversations)
                    .map_err(ChatError::Serialization)?;
                println!("{}", json);
            } else {
                print_conversation_table(&conversations);
            }
        }
        ChatsCommand::New { title } => {
            let created = store.create_conversation(title.as_deref())?;
            println!(
                "{}",
                format!("Created conversation {} ({})", created.title, short_id(&created.id))
                    .green()
            );
        }
        ChatsCommand::Select { id } => {
            let id = store.resolve_id(&id)?;
            store.select_conversation(&id)?;
            if let Some(selected) = store.selected_conversation() {
                println!("{}", format!("Selected {}", selected.title).green());
            }
        }
        ChatsCommand::Rename { id, title } => {
            let id = store.resolve_id(&id)?;
            if title.trim().is_empty() {
                println!("{}", "Title cannot be empty; nothing changed.".yellow());
                return Ok(());
            }
            store.rename_conversation(&id, &title)?;
            println!("{}", format!("Renamed {} to {}", short_id(&id), title.trim()).green());
        }
        ChatsCommand::Delete { id } => {
            let id = store.resolve_id(&id)?;
            store.delete_conversation(&id)?;
            println!("{}", format!("Deleted conversation {}", short_id(&id)).green());
        }
        ChatsCommand::Show { id } => {
            let id = match id {
                Some(prefix) => store.resolve_id(&prefix)?,
                None => match store.selected_conversation_id() {
                    Some(id) => id,
                    None => return Ok(()),
                },
            };
            if let Some(conversation) = store.conversation(&id) {
                println!("\n{}", conversation.title.bold());
            }
            print_messages(&store.get_messages(&id));
        }
    }

    Ok(())
}

/// First characters of a conversation id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((cut, _)) => &id[..cut],
        None => id,
    }
}

/// Print conversations as a table, marking the selected one
pub fn print_conversation_table(conversations: &[Conversation]) {
    if conversations.is_empty() {
        println!("{}", "No conversations found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "",
        "ID".bold(),
        "Title".bold(),
        "Last Message".bold(),
        "Last Updated".bold()
    ]);

    for conversation in conversations {
        let marker = if conversation.is_selected { "*" } else { "" };
        let title = if conversation.is_selected {
            conversation.title.bold().to_string()
        } else {
            conversation.title.clone()
        };
        let last = conversation
            .last_message_preview
            .clone()
            .unwrap_or_else(|| "-".to_string());
        let updated = conversation
            .updated_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            marker.green(),
            short_id(&conversation.id).cyan(),
            title,
            last,
            updated
        ]);
    }

    println!("\nConversations:");
    table.printstd();
    println!();
    println!(
        "Use {} to switch conversations.",
        "aio-chat chats select <ID>".cyan()
    );
    println!();
}

/// Print a message log
pub fn print_messages(messages: &[MessageLogEntry]) {
    if messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
        return;
    }

    for entry in messages {
        let time = entry
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M");
        let who = match entry.role {
            Role::User => "you".cyan().bold(),
            Role::Assistant => "assistant".magenta().bold(),
        };
        println!("[{}] {}: {}", time, who, entry.content);
    }
    println!();
}
