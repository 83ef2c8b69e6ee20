/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chats` - Conversation management (list, new, select, rename, delete, show)
- `send`  - One-shot message to the selected conversation
- `chat`  - Interactive chat mode
- `serve` - HTTP gateway server
- `check` - Connection check against the language model
*/

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{ChatError, Result};
use crate::gateway::OpenAiGateway;
use crate::storage::open_storage;

// Conversation management commands
pub mod chats;

// Interactive chat loop
pub mod chat;

// One-shot message exchange
pub mod send;

// Slash commands parser for interactive mode
pub mod special_commands;

/// Open the conversation store configured in `config`
///
/// # Errors
///
/// Returns an error if the backend cannot be opened or initialized
pub fn open_store(config: &Config) -> Result<ConversationStore> {
    let storage = open_storage(&config.storage)?;
    ConversationStore::open(storage)
}

/// Build the gateway configured in `config`
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created
pub fn build_gateway(config: &Config) -> Result<OpenAiGateway> {
    OpenAiGateway::new(config.gateway.clone())
}

/// Render an error for the terminal, appending the hint of gateway failures
pub fn describe_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ChatError>() {
        Some(ChatError::Gateway { message, hint, .. }) => {
            format!("Error: {}\nHint: {}", message, hint)
        }
        _ => format!("Error: {:#}", error),
    }
}

// Gateway server command handler
pub mod serve {
    //! Runs the HTTP gateway until Ctrl-C.

    use super::*;
    use crate::server::{run_server, AppState};
    use std::net::SocketAddr;

    /// Start the server
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `bind` - Address override for `server.bind`
    pub async fn run_serve(config: &Config, bind: Option<String>) -> Result<()> {
        let bind = bind.unwrap_or_else(|| config.server.bind.clone());
        let addr: SocketAddr = bind.parse().map_err(|e| {
            ChatError::Config(format!("Invalid bind address {}: {}", bind, e))
        })?;

        if config.gateway.api_key().is_none() {
            tracing::warn!(
                "{} is not set; chat requests will fail until it is",
                config.gateway.api_key_env
            );
        }

        let state = AppState::from_config(config.gateway.clone())?;
        run_server(state, addr).await
    }
}

// Connection check command handler
pub mod check {
    //! Verifies credentials and reachability of the language model.

    use super::*;
    use crate::gateway::Gateway;
    use colored::Colorize;

    /// Run the connection check and print the outcome
    ///
    /// # Errors
    ///
    /// Returns the gateway failure when the check does not succeed
    pub async fn run_check(config: &Config) -> Result<()> {
        let gateway = build_gateway(config)?;
        let info = gateway.check_connection().await?;

        println!("{}", "Connection to the language model established".green());
        println!("  Provider: {}", info.provider.cyan());
        println!("  Model:    {}", info.model.cyan());
        println!("  Response: {}", info.response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::error::GatewayFailure;

    #[test]
    fn test_describe_error_includes_hint() {
        let error: anyhow::Error =
            ChatError::gateway(GatewayFailure::Unauthorized, "bad key", "Check GROQ_API_KEY")
                .into();
        let text = describe_error(&error);
        assert!(text.contains("bad key"));
        assert!(text.contains("Hint: Check GROQ_API_KEY"));
    }

    #[test]
    fn test_describe_error_plain() {
        let error: anyhow::Error = ChatError::NotFound("abc".to_string()).into();
        assert_eq!(describe_error(&error), "Error: Conversation not found: abc");
    }

    #[test]
    fn test_open_store_with_memory_backend() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        let store = open_store(&config).unwrap();
        assert_eq!(store.list_conversations().len(), 1);
    }

    #[test]
    fn test_open_store_with_sqlite_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let id = {
            let mut store = open_store(&config).unwrap();
            store.create_conversation(Some("Kept")).unwrap().id
        };

        let store = open_store(&config).unwrap();
        assert_eq!(store.list_conversations().len(), 2);
        assert_eq!(store.conversation(&id).unwrap().title, "Kept");
    }
}
