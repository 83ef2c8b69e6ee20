//! Conversation and message log records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Maximum number of characters kept in a conversation preview
pub const PREVIEW_MAX_CHARS: usize = 30;

/// Summary record of a conversation, as listed in the sidebar
///
/// Serialized with camelCase keys under the `"chats"` storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier (ULID)
    pub id: String,
    /// Display title
    pub title: String,
    /// Truncated copy of the latest message, if any message was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
    /// Whether this is the active conversation
    #[serde(default)]
    pub is_selected: bool,
}

impl Conversation {
    /// Create a new, unselected conversation with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_conversation_id(),
            title: title.into(),
            last_message_preview: None,
            updated_at: Utc::now(),
            is_selected: false,
        }
    }
}

/// Author of a message log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Reply produced by the language model
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a conversation's log
///
/// # Examples
///
/// ```
/// use aio_chat::conversation::{MessageLogEntry, Role};
///
/// let entry = MessageLogEntry::user("Hello!");
/// assert_eq!(entry.role, Role::User);
/// assert_eq!(entry.content, "Hello!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// Unique message identifier
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was written
    pub timestamp: DateTime<Utc>,
}

impl MessageLogEntry {
    /// Create an entry with a fresh id and the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user entry
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Generate a new ULID for a conversation
///
/// # Examples
///
/// ```
/// use aio_chat::conversation::new_conversation_id;
///
/// let id = new_conversation_id();
/// assert_eq!(id.len(), 26);
/// ```
pub fn new_conversation_id() -> String {
    Ulid::new().to_string()
}

/// Default title for the conversation created when `existing` already exist
pub fn default_title(existing: usize) -> String {
    format!("New conversation {}", existing + 1)
}

/// Derive the sidebar preview of a message
///
/// Content longer than [`PREVIEW_MAX_CHARS`] characters is cut to that many
/// characters and suffixed with `"..."`; shorter content is kept as is.
///
/// # Examples
///
/// ```
/// use aio_chat::conversation::preview;
///
/// assert_eq!(preview("short"), "short");
/// assert_eq!(
///     preview("abcdefghijklmnopqrstuvwxyz0123456789"),
///     "abcdefghijklmnopqrstuvwxyz0123..."
/// );
/// ```
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_keeps_exactly_thirty_chars() {
        let content = "a".repeat(30);
        assert_eq!(preview(&content), content);
    }

    #[test]
    fn test_preview_truncates_thirty_one_chars() {
        let content = "a".repeat(31);
        assert_eq!(preview(&content), format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let content = "é".repeat(40);
        let result = preview(&content);
        assert_eq!(result.chars().count(), 33);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_default_title_is_one_based() {
        assert_eq!(default_title(0), "New conversation 1");
        assert_eq!(default_title(4), "New conversation 5");
    }

    #[test]
    fn test_conversation_serializes_camel_case() {
        let mut conversation = Conversation::new("Title");
        conversation.last_message_preview = Some("hi".to_string());
        conversation.is_selected = true;

        let json = serde_json::to_value(&conversation).unwrap();
        assert_eq!(json["title"], "Title");
        assert_eq!(json["lastMessagePreview"], "hi");
        assert_eq!(json["isSelected"], true);
        assert!(json["updatedAt"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_conversation_deserializes_without_optional_fields() {
        let json = r#"{"id":"x","title":"t","updatedAt":"2025-01-02T03:04:05Z"}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert!(conversation.last_message_preview.is_none());
        assert!(!conversation.is_selected);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"id":"1","role":"system","content":"x","timestamp":"2025-01-02T03:04:05Z"}"#;
        assert!(serde_json::from_str::<MessageLogEntry>(json).is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
