//! Command-line interface definition for aio-chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for conversation management, chatting, and serving.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aio-chat - Multi-conversation chat client for hosted language models
///
/// Keeps conversations in a local key-value store and streams replies
/// from an OpenAI-compatible API.
#[derive(Parser, Debug, Clone)]
#[command(name = "aio-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding the conversation database
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for aio-chat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage conversations
    Chats {
        /// Conversation management subcommand
        #[command(subcommand)]
        command: ChatsCommand,
    },

    /// Send one message to the selected conversation and print the reply
    Send {
        /// Message text
        text: String,

        /// Model to use, e.g. groq:llama-3.1-8b-instant
        #[arg(short, long)]
        model: Option<String>,

        /// Area of expertise for the reply (repeatable)
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },

    /// Start an interactive chat session on the selected conversation
    Chat {
        /// Model to use, e.g. groq:llama-3.1-8b-instant
        #[arg(short, long)]
        model: Option<String>,

        /// Area of expertise for the replies (repeatable)
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },

    /// Run the HTTP gateway server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Verify the API key and connectivity to the language model
    Check,
}

/// Conversation management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatsCommand {
    /// List conversations, most recent first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create a conversation and select it
    New {
        /// Title of the conversation
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Select a conversation
    Select {
        /// Conversation id or unique id prefix
        id: String,
    },

    /// Rename a conversation
    Rename {
        /// Conversation id or unique id prefix
        id: String,

        /// New title
        title: String,
    },

    /// Delete a conversation and its messages
    Delete {
        /// Conversation id or unique id prefix
        id: String,
    },

    /// Print the messages of a conversation
    Show {
        /// Conversation id or prefix (defaults to the selected conversation)
        id: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or("config/config.yaml")
    }
}
