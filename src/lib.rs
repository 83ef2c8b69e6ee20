//! aio-chat - multi-conversation chat client library
//!
//! This library keeps an ordered collection of conversations and their
//! message logs in a key-value store, and talks to a hosted language model
//! through an OpenAI-compatible streaming API.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `conversation`: Conversation store, records, and change observers
//! - `storage`: Key-value backends (sled, SQLite, memory)
//! - `gateway`: Language model gateway and streaming decoder
//! - `server`: HTTP front-end for the gateway
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```
//! use aio_chat::conversation::{ConversationStore, MessageLogEntry};
//! use aio_chat::storage::MemoryStore;
//!
//! # fn main() -> aio_chat::Result<()> {
//! let mut store = ConversationStore::open(MemoryStore::new())?;
//! let id = store.selected_conversation_id().expect("one conversation is selected");
//! store.append_message(&id, MessageLogEntry::user("Hello!"))?;
//! assert_eq!(store.get_messages(&id).len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{Conversation, ConversationStore, MessageLogEntry, Role, Subscription};
pub use error::{ChatError, GatewayFailure, Result};
pub use gateway::{Gateway, GatewayEvent, GatewayRequest, OpenAiGateway};
