//! Language model gateway
//!
//! The gateway takes a role-tagged message list, a model identifier and a
//! set of role hints, and streams back text fragments terminated by a
//! [`GatewayEvent::Finish`] carrying the assembled reply and usage. Failures
//! are raised as [`ChatError::Gateway`](crate::error::ChatError::Gateway)
//! with a [`GatewayFailure`] reason and a hint for the user.

use crate::conversation::{MessageLogEntry, Role};
use crate::error::{ChatError, GatewayFailure, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub mod openai;
pub mod sse;

pub use openai::OpenAiGateway;

/// Prompt used when the user picked no role
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and friendly assistant.";

/// Prefix that marks a Groq-hosted model identifier
pub const GROQ_MODEL_PREFIX: &str = "groq:";

/// Role of a message sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the model
    System,
    /// User input
    User,
    /// Previous model output
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// One message of a gateway request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&MessageLogEntry> for ChatMessage {
    fn from(entry: &MessageLogEntry) -> Self {
        Self::new(entry.role.into(), entry.content.clone())
    }
}

/// A chat request to the gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,
    /// Requested model identifier (may carry the `groq:` prefix or be empty)
    pub model: String,
    /// Areas of expertise the reply should focus on
    pub role_hints: Vec<String>,
}

impl GatewayRequest {
    /// Build a request from a conversation's message log
    ///
    /// # Examples
    ///
    /// ```
    /// use aio_chat::conversation::MessageLogEntry;
    /// use aio_chat::gateway::{ChatRole, GatewayRequest};
    ///
    /// let log = vec![MessageLogEntry::user("Hi")];
    /// let request = GatewayRequest::from_log(&log, "groq:llama-3.1-8b-instant", vec![]);
    /// assert_eq!(request.messages[0].role, ChatRole::User);
    /// ```
    pub fn from_log(
        log: &[MessageLogEntry],
        model: impl Into<String>,
        role_hints: Vec<String>,
    ) -> Self {
        Self {
            messages: log.iter().map(ChatMessage::from).collect(),
            model: model.into(),
            role_hints,
        }
    }
}

/// Token accounting reported by the upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens in the reply
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of both
    #[serde(default)]
    pub total_tokens: u64,
}

/// Item of a gateway stream
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Next fragment of the reply
    TextDelta(String),
    /// End of the reply
    Finish {
        /// The full reply text
        message: String,
        /// Usage metadata, when the upstream reported it
        usage: Option<TokenUsage>,
    },
}

/// Stream of gateway events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<GatewayEvent>> + Send>>;

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Model that answered
    pub model: String,
    /// Provider name
    pub provider: String,
    /// Text returned by the model
    pub response: String,
}

/// Language model gateway
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Start a streamed chat completion
    ///
    /// Errors detected before streaming starts (missing credential,
    /// rejected request) are returned directly; later failures arrive as an
    /// `Err` item that ends the stream.
    async fn stream_chat(&self, request: GatewayRequest) -> Result<EventStream>;

    /// Issue a minimal completion to verify credentials and reachability
    async fn check_connection(&self) -> Result<ConnectionInfo>;
}

/// Final outcome of a drained stream
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The full reply text
    pub message: String,
    /// Usage metadata, when reported
    pub usage: Option<TokenUsage>,
}

/// Consume a stream, passing each fragment to `on_delta`
///
/// A stream that ends without a `Finish` event yields the concatenated
/// fragments and no usage.
///
/// # Errors
///
/// Returns the first error item of the stream
pub async fn drain_stream<F>(mut stream: EventStream, mut on_delta: F) -> Result<Completion>
where
    F: FnMut(&str),
{
    let mut assembled = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            GatewayEvent::TextDelta(text) => {
                on_delta(&text);
                assembled.push_str(&text);
            }
            GatewayEvent::Finish { message, usage } => {
                return Ok(Completion { message, usage });
            }
        }
    }
    Ok(Completion {
        message: assembled,
        usage: None,
    })
}

/// Build the system prompt for a set of role hints
///
/// # Examples
///
/// ```
/// use aio_chat::gateway::{build_system_prompt, DEFAULT_SYSTEM_PROMPT};
///
/// assert_eq!(build_system_prompt(&[]), DEFAULT_SYSTEM_PROMPT);
/// let prompt = build_system_prompt(&["Lawyer".to_string(), "Accountant".to_string()]);
/// assert!(prompt.contains("Lawyer, Accountant"));
/// ```
pub fn build_system_prompt(role_hints: &[String]) -> String {
    let roles: Vec<&str> = role_hints
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();

    if roles.is_empty() {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    }

    format!(
        "You are an assistant specialized in the following areas: {}. \
         Give accurate answers relevant to these professional areas, using appropriate \
         terminology and considering the specific needs of these fields. When possible, \
         offer practical examples and actionable recommendations.",
        roles.join(", ")
    )
}

/// Resolve the model identifier sent upstream
///
/// `groq:<name>` becomes `<name>`; an empty identifier (or a bare prefix)
/// becomes `default_model`; anything else is passed through.
///
/// # Examples
///
/// ```
/// use aio_chat::gateway::resolve_model;
///
/// assert_eq!(resolve_model("groq:llama-3.1-8b-instant", "d"), "llama-3.1-8b-instant");
/// assert_eq!(resolve_model("", "d"), "d");
/// assert_eq!(resolve_model("mixtral-8x7b-32768", "d"), "mixtral-8x7b-32768");
/// ```
pub fn resolve_model(requested: &str, default_model: &str) -> String {
    let requested = requested.trim();
    let name = requested.strip_prefix(GROQ_MODEL_PREFIX).unwrap_or(requested);
    let name = name.trim();
    if name.is_empty() {
        default_model
            .strip_prefix(GROQ_MODEL_PREFIX)
            .unwrap_or(default_model)
            .to_string()
    } else {
        name.to_string()
    }
}

/// Hint shown with a gateway failure
pub fn failure_hint(reason: GatewayFailure, api_key_env: &str) -> String {
    match reason {
        GatewayFailure::MissingCredential => format!(
            "Set the {} environment variable with a valid API key",
            api_key_env
        ),
        GatewayFailure::InvalidModel => {
            "Pick a model that is available for your account and try again".to_string()
        }
        GatewayFailure::Unauthorized => format!(
            "The key in {} may be invalid, expired or lack permissions",
            api_key_env
        ),
        GatewayFailure::Upstream => {
            "Check your network connection and the API status, then try again".to_string()
        }
    }
}

/// Extract the failure reason of a gateway error, if `error` is one
pub fn failure_reason(error: &anyhow::Error) -> Option<GatewayFailure> {
    match error.downcast_ref::<ChatError>() {
        Some(ChatError::Gateway { reason, .. }) => Some(*reason),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_prompt_ignores_blank_hints() {
        assert_eq!(
            build_system_prompt(&["  ".to_string()]),
            DEFAULT_SYSTEM_PROMPT
        );
    }

    #[test]
    fn test_resolve_model_bare_prefix_uses_default() {
        assert_eq!(resolve_model("groq:", "fallback"), "fallback");
    }

    #[test]
    fn test_resolve_model_strips_prefix_from_default() {
        assert_eq!(resolve_model("", "groq:fallback"), "fallback");
    }

    #[test]
    fn test_from_log_maps_roles() {
        let log = vec![
            MessageLogEntry::user("q"),
            MessageLogEntry::assistant("a"),
        ];
        let request = GatewayRequest::from_log(&log, "", vec!["Doctor".to_string()]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].role, ChatRole::Assistant);
        assert_eq!(request.role_hints, vec!["Doctor"]);
    }

    #[test]
    fn test_chat_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&ChatMessage::new(ChatRole::System, "x")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"x"}"#);
    }

    #[tokio::test]
    async fn test_drain_stream_collects_deltas() {
        let events = vec![
            Ok(GatewayEvent::TextDelta("Hel".to_string())),
            Ok(GatewayEvent::TextDelta("lo".to_string())),
            Ok(GatewayEvent::Finish {
                message: "Hello".to_string(),
                usage: Some(TokenUsage {
                    prompt_tokens: 3,
                    completion_tokens: 2,
                    total_tokens: 5,
                }),
            }),
        ];
        let stream: EventStream = Box::pin(futures::stream::iter(events));

        let mut seen = String::new();
        let completion = drain_stream(stream, |d| seen.push_str(d)).await.unwrap();
        assert_eq!(seen, "Hello");
        assert_eq!(completion.message, "Hello");
        assert_eq!(completion.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_drain_stream_without_finish_uses_deltas() {
        let events = vec![Ok(GatewayEvent::TextDelta("partial".to_string()))];
        let stream: EventStream = Box::pin(futures::stream::iter(events));
        let completion = drain_stream(stream, |_| {}).await.unwrap();
        assert_eq!(completion.message, "partial");
        assert!(completion.usage.is_none());
    }

    #[tokio::test]
    async fn test_drain_stream_propagates_error() {
        let events: Vec<Result<GatewayEvent>> = vec![
            Ok(GatewayEvent::TextDelta("a".to_string())),
            Err(ChatError::gateway(GatewayFailure::Upstream, "boom", "retry").into()),
        ];
        let stream: EventStream = Box::pin(futures::stream::iter(events));
        let err = drain_stream(stream, |_| {}).await.unwrap_err();
        assert_eq!(failure_reason(&err), Some(GatewayFailure::Upstream));
    }

    #[test]
    fn test_failure_hint_mentions_env_var() {
        let hint = failure_hint(GatewayFailure::MissingCredential, "GROQ_API_KEY");
        assert!(hint.contains("GROQ_API_KEY"));
    }
}
