//! Conversation store
//!
//! Owns the list of conversations and their message logs, mirrors both into
//! a [`KeyValueStore`], and notifies observers after every mutation.
//!
//! The in-memory list is authoritative. Each mutation builds the next list,
//! writes it (together with any message-log change) as one atomic storage
//! batch, and only then swaps it in and notifies listeners. A failed write
//! therefore leaves memory, storage, and observers exactly as they were.
//!
//! Invariants held after every successful call:
//!
//! - the list is never empty
//! - exactly one conversation has `is_selected == true`, and its id is the
//!   one returned by [`ConversationStore::selected_conversation_id`]

use crate::error::{ChatError, Result};
use crate::storage::{messages_key, KeyValueStore, StorageBatch, CONVERSATIONS_KEY};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

pub mod subscription;
pub mod types;

pub use subscription::{Listener, ListenerRegistry, Subscription};
pub use types::{
    default_title, new_conversation_id, preview, Conversation, MessageLogEntry, Role,
    PREVIEW_MAX_CHARS,
};

/// Conversation list and message logs backed by durable storage
///
/// # Examples
///
/// ```
/// use aio_chat::conversation::{ConversationStore, MessageLogEntry};
/// use aio_chat::storage::MemoryStore;
///
/// # fn main() -> aio_chat::error::Result<()> {
/// let mut store = ConversationStore::open(MemoryStore::new())?;
/// assert_eq!(store.list_conversations()[0].title, "New conversation 1");
///
/// let id = store.selected_conversation_id().unwrap();
/// store.save_messages(&id, &[MessageLogEntry::user("Hello")])?;
/// assert_eq!(store.get_messages(&id).len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ConversationStore<S: KeyValueStore = Box<dyn KeyValueStore>> {
    storage: S,
    conversations: Vec<Conversation>,
    selected_id: Option<String>,
    listeners: ListenerRegistry<Conversation>,
    message_listeners: ListenerRegistry<MessageLogEntry>,
}

impl<S: KeyValueStore> ConversationStore<S> {
    /// Load the persisted conversation list and establish the invariants
    ///
    /// An empty or unreadable list yields one default conversation. A
    /// non-empty list gets its first conversation selected and every other
    /// selection flag cleared, and the repaired list is written back.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the initial list cannot be written
    pub fn open(storage: S) -> Result<Self> {
        let persisted = load_conversations(&storage);
        let mut store = Self {
            storage,
            conversations: Vec::new(),
            selected_id: None,
            listeners: ListenerRegistry::new(),
            message_listeners: ListenerRegistry::new(),
        };

        match persisted.first().map(|c| c.id.clone()) {
            None => {
                tracing::info!("No stored conversations, creating a default one");
                store.create_conversation(None)?;
            }
            Some(first_id) => {
                tracing::debug!("Loaded {} stored conversations", persisted.len());
                let next = with_selection(persisted, &first_id);
                store.commit(next, Some(first_id), StorageBatch::new())?;
            }
        }

        Ok(store)
    }

    /// Snapshot of the conversation list, most recent first
    pub fn list_conversations(&self) -> Vec<Conversation> {
        self.conversations.clone()
    }

    /// Id of the selected conversation
    pub fn selected_conversation_id(&self) -> Option<String> {
        self.selected_id.clone()
    }

    /// Snapshot of the selected conversation
    pub fn selected_conversation(&self) -> Option<Conversation> {
        self.selected_id.as_deref().and_then(|id| self.conversation(id))
    }

    /// Snapshot of the conversation with `id`
    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.conversations.iter().find(|c| c.id == id).cloned()
    }

    /// Resolve a full id or a unique id prefix to a conversation id
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotFound` when nothing matches and
    /// `ChatError::AmbiguousId` when several conversations share the prefix
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        if self.conversations.iter().any(|c| c.id == id_or_prefix) {
            return Ok(id_or_prefix.to_string());
        }

        let needle = id_or_prefix.to_ascii_uppercase();
        let matches: Vec<&Conversation> = self
            .conversations
            .iter()
            .filter(|c| !needle.is_empty() && c.id.to_ascii_uppercase().starts_with(&needle))
            .collect();

        match matches.as_slice() {
            [] => Err(ChatError::NotFound(id_or_prefix.to_string()).into()),
            [single] => Ok(single.id.clone()),
            many => Err(ChatError::AmbiguousId {
                prefix: id_or_prefix.to_string(),
                count: many.len(),
            }
            .into()),
        }
    }

    /// Read a conversation's message log
    ///
    /// Missing, unreadable or corrupt logs are reported as empty; the
    /// failure is logged and never returned.
    pub fn get_messages(&self, conversation_id: &str) -> Vec<MessageLogEntry> {
        load_messages(&self.storage, conversation_id)
    }

    /// Replace a conversation's message log
    ///
    /// When `messages` is non-empty and the conversation exists, its
    /// preview and `updated_at` are recomputed from the last entry. The log
    /// and the list are written in one batch, then list observers are
    /// notified.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if serialization or the write fails
    pub fn save_messages(&mut self, conversation_id: &str, messages: &[MessageLogEntry]) -> Result<()> {
        let log = serde_json::to_string(messages)
            .map_err(|e| ChatError::Storage(format!("Failed to serialize messages: {}", e)))?;

        let mut next = self.conversations.clone();
        if let Some(last) = messages.last() {
            if let Some(conversation) = next.iter_mut().find(|c| c.id == conversation_id) {
                conversation.last_message_preview = Some(preview(&last.content));
                conversation.updated_at = Utc::now();
            }
        }

        let batch = StorageBatch::new().set(messages_key(conversation_id), log);
        self.commit(next, self.selected_id.clone(), batch)?;
        tracing::debug!(
            "Saved {} messages for conversation {}",
            messages.len(),
            conversation_id
        );
        Ok(())
    }

    /// Append one entry to a conversation's log and save it
    pub fn append_message(&mut self, conversation_id: &str, entry: MessageLogEntry) -> Result<()> {
        let mut messages = self.get_messages(conversation_id);
        messages.push(entry);
        self.save_messages(conversation_id, &messages)
    }

    /// Create a conversation, select it and put it first in the list
    ///
    /// A missing or empty title defaults to `"New conversation {n+1}"`
    /// where `n` is the current number of conversations.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the write fails
    pub fn create_conversation(&mut self, title: Option<&str>) -> Result<Conversation> {
        let title = match title {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => default_title(self.conversations.len()),
        };

        let mut created = Conversation::new(title);
        created.is_selected = true;

        let mut next = Vec::with_capacity(self.conversations.len() + 1);
        next.push(created.clone());
        next.extend(self.conversations.iter().cloned().map(|mut c| {
            c.is_selected = false;
            c
        }));

        self.commit(next, Some(created.id.clone()), StorageBatch::new())?;
        tracing::info!("Created conversation {} ({})", created.id, created.title);
        Ok(created)
    }

    /// Make `conversation_id` the only selected conversation
    ///
    /// Unknown ids are ignored. After the list is persisted and broadcast,
    /// message observers receive the newly selected log.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the write fails
    pub fn select_conversation(&mut self, conversation_id: &str) -> Result<()> {
        if !self.conversations.iter().any(|c| c.id == conversation_id) {
            tracing::debug!("Ignoring selection of unknown conversation {}", conversation_id);
            return Ok(());
        }

        let next = with_selection(self.conversations.clone(), conversation_id);
        self.commit(next, Some(conversation_id.to_string()), StorageBatch::new())?;

        let messages = self.get_messages(conversation_id);
        self.message_listeners.notify(&messages);
        Ok(())
    }

    /// Change a conversation's title
    ///
    /// Empty or whitespace-only titles are ignored; others are stored
    /// trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the write fails
    pub fn rename_conversation(&mut self, conversation_id: &str, new_title: &str) -> Result<()> {
        let title = new_title.trim();
        if title.is_empty() {
            tracing::debug!("Ignoring empty title for conversation {}", conversation_id);
            return Ok(());
        }

        let next = self
            .conversations
            .iter()
            .cloned()
            .map(|mut c| {
                if c.id == conversation_id {
                    c.title = title.to_string();
                    c.updated_at = Utc::now();
                }
                c
            })
            .collect();

        self.commit(next, self.selected_id.clone(), StorageBatch::new())
    }

    /// Delete a conversation and its message log
    ///
    /// Deleting the selected conversation selects the first remaining one
    /// and emits its log to message observers. Deleting the last
    /// conversation replaces it with a fresh default conversation and emits
    /// an empty log.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the write fails
    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<()> {
        let was_selected = self.selected_id.as_deref() == Some(conversation_id);
        let remaining: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.id != conversation_id)
            .cloned()
            .collect();
        let batch = StorageBatch::new().remove(messages_key(conversation_id));

        if remaining.is_empty() {
            let mut replacement = Conversation::new(default_title(0));
            replacement.is_selected = true;
            let replacement_id = replacement.id.clone();

            self.commit(vec![replacement], Some(replacement_id.clone()), batch)?;
            tracing::info!(
                "Deleted last conversation {}, created {}",
                conversation_id,
                replacement_id
            );
            self.message_listeners.notify(&[]);
        } else if was_selected {
            let first_id = remaining[0].id.clone();
            let next = with_selection(remaining, &first_id);

            self.commit(next, Some(first_id.clone()), batch)?;
            tracing::info!(
                "Deleted selected conversation {}, selected {}",
                conversation_id,
                first_id
            );
            let messages = self.get_messages(&first_id);
            self.message_listeners.notify(&messages);
        } else {
            self.commit(remaining, self.selected_id.clone(), batch)?;
            tracing::info!("Deleted conversation {}", conversation_id);
        }

        Ok(())
    }

    /// Observe the conversation list
    ///
    /// The listener is called once with the current list before this
    /// returns, then after every successful mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Conversation]) + Send + Sync + 'static,
    {
        let listener: Listener<Conversation> = Arc::new(listener);
        let subscription = self.listeners.register(Arc::clone(&listener));
        listener(&self.conversations);
        subscription
    }

    /// Observe the message log of the selected conversation
    ///
    /// The listener is called once with the selected conversation's log
    /// before this returns, then whenever the selection changes.
    pub fn subscribe_to_messages<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[MessageLogEntry]) + Send + Sync + 'static,
    {
        let listener: Listener<MessageLogEntry> = Arc::new(listener);
        let subscription = self.message_listeners.register(Arc::clone(&listener));
        if let Some(id) = &self.selected_id {
            let messages = self.get_messages(id);
            listener(&messages);
        }
        subscription
    }

    /// Read access to the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the underlying storage
    ///
    /// Writes made through this handle bypass the store and are not
    /// reflected in its in-memory list.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Tear the store down and hand back its storage
    ///
    /// Outstanding subscriptions become inert.
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn commit(
        &mut self,
        next: Vec<Conversation>,
        selected_id: Option<String>,
        batch: StorageBatch,
    ) -> Result<()> {
        let list = serde_json::to_string(&next)
            .map_err(|e| ChatError::Storage(format!("Failed to serialize conversations: {}", e)))?;

        self.storage.apply(batch.set(CONVERSATIONS_KEY, list))?;

        self.conversations = next;
        self.selected_id = selected_id;
        self.listeners.notify(&self.conversations);
        Ok(())
    }
}

impl<S: KeyValueStore> std::fmt::Debug for ConversationStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("conversations", &self.conversations.len())
            .field("selected_id", &self.selected_id)
            .field("listeners", &self.listeners.len())
            .field("message_listeners", &self.message_listeners.len())
            .finish()
    }
}

fn with_selection(conversations: Vec<Conversation>, selected_id: &str) -> Vec<Conversation> {
    conversations
        .into_iter()
        .map(|mut c| {
            c.is_selected = c.id == selected_id;
            c
        })
        .collect()
}

fn load_conversations<S: KeyValueStore + ?Sized>(storage: &S) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    read_conversations(storage)
        .into_iter()
        .filter(|c| {
            let first = seen.insert(c.id.clone());
            if !first {
                tracing::warn!("Dropping duplicate stored conversation {}", c.id);
            }
            first
        })
        .collect()
}

fn read_conversations<S: KeyValueStore + ?Sized>(storage: &S) -> Vec<Conversation> {
    match storage.get(CONVERSATIONS_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable conversation list: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read conversation list: {}", e);
            Vec::new()
        }
    }
}

fn load_messages<S: KeyValueStore + ?Sized>(storage: &S, conversation_id: &str) -> Vec<MessageLogEntry> {
    match storage.get(&messages_key(conversation_id)) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!(
                "Discarding unreadable message log for {}: {}",
                conversation_id,
                e
            );
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read message log for {}: {}", conversation_id, e);
            Vec::new()
        }
    }
}
