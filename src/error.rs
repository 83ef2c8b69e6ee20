//! Error types for aio-chat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use std::fmt;

use thiserror::Error;

/// Machine-checkable reason attached to a gateway failure
///
/// Lets callers (the HTTP server, the CLI) distinguish a configuration
/// problem from a transient upstream failure without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayFailure {
    /// No API key is available for the upstream provider
    MissingCredential,
    /// The requested model does not exist or was retired upstream
    InvalidModel,
    /// The upstream rejected the credential
    Unauthorized,
    /// Any other upstream or transport failure
    Upstream,
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatewayFailure::MissingCredential => "missing_credential",
            GatewayFailure::InvalidModel => "invalid_model",
            GatewayFailure::Unauthorized => "unauthorized",
            GatewayFailure::Upstream => "upstream",
        };
        f.write_str(s)
    }
}

/// Main error type for aio-chat operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable storage errors (open, write, flush)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Language model gateway errors
    #[error("Gateway error ({reason}): {message}")]
    Gateway {
        /// Classified failure reason
        reason: GatewayFailure,
        /// Human-readable description
        message: String,
        /// Suggestion shown to the user
        hint: String,
    },

    /// A conversation id (or prefix) did not match anything
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// A conversation id prefix matched more than one conversation
    #[error("Conversation id prefix is ambiguous: {prefix} matches {count} conversations")]
    AmbiguousId {
        /// The prefix supplied by the user
        prefix: String,
        /// Number of matching conversations
        count: usize,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Line editor errors in interactive mode
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

impl ChatError {
    /// Build a gateway error
    pub fn gateway(
        reason: GatewayFailure,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        ChatError::Gateway {
            reason,
            message: message.into(),
            hint: hint.into(),
        }
    }
}

/// Result type alias for aio-chat operations
///
/// Uses `anyhow::Error` so callers can attach context while library code
/// raises typed `ChatError` values that remain downcastable.
pub type Result<T> = anyhow::Result<T>;
