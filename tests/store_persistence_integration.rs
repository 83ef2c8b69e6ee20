//! Conversation store persistence across reopen, for each durable backend

mod common;

use aio_chat::conversation::{ConversationStore, MessageLogEntry, Role};
use aio_chat::storage::{messages_key, KeyValueStore, CONVERSATIONS_KEY};

/// Build some state, returning (selected id, other id)
fn populate<S: KeyValueStore>(store: &mut ConversationStore<S>) -> (String, String) {
    let first = store.selected_conversation_id().unwrap();
    store.rename_conversation(&first, "Contracts").unwrap();
    store
        .save_messages(
            &first,
            &[
                MessageLogEntry::user("Can I break a lease early?"),
                MessageLogEntry::assistant("It depends on the termination clause in your contract."),
            ],
        )
        .unwrap();

    let second = store.create_conversation(Some("Taxes")).unwrap().id;
    store
        .append_message(&second, MessageLogEntry::user("Deadline?"))
        .unwrap();
    (second, first)
}

fn assert_reopened<S: KeyValueStore>(store: &ConversationStore<S>, newest: &str, oldest: &str) {
    let conversations = store.list_conversations();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].id, newest);
    assert_eq!(conversations[1].id, oldest);

    // Reopening selects the first conversation
    assert_eq!(store.selected_conversation_id().as_deref(), Some(newest));
    assert_eq!(conversations.iter().filter(|c| c.is_selected).count(), 1);

    let contracts = store.conversation(oldest).unwrap();
    assert_eq!(contracts.title, "Contracts");
    assert_eq!(
        contracts.last_message_preview.as_deref(),
        Some("It depends on the termination ...")
    );

    let log = store.get_messages(oldest);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(store.get_messages(newest).len(), 1);
}

#[test]
fn test_sqlite_state_survives_reopen() {
    let (storage, tmp) = common::create_temp_sqlite();
    let (newest, oldest) = {
        let mut store = ConversationStore::open(storage).unwrap();
        populate(&mut store)
    };

    let store = ConversationStore::open(common::reopen_sqlite(&tmp)).unwrap();
    assert_reopened(&store, &newest, &oldest);
}

#[test]
fn test_sled_state_survives_reopen() {
    let (storage, tmp) = common::create_temp_sled();
    let (newest, oldest) = {
        let mut store = ConversationStore::open(storage).unwrap();
        populate(&mut store)
    };

    let store = ConversationStore::open(common::reopen_sled(&tmp)).unwrap();
    assert_reopened(&store, &newest, &oldest);
}

#[test]
fn test_storage_layout_uses_shared_keys() {
    let (storage, _tmp) = common::create_temp_sqlite();
    let mut store = ConversationStore::open(storage).unwrap();
    let id = store.selected_conversation_id().unwrap();
    store
        .append_message(&id, MessageLogEntry::user("hello"))
        .unwrap();

    let raw = store.storage().get(CONVERSATIONS_KEY).unwrap().unwrap();
    let list: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["isSelected"], true);
    assert_eq!(list[0]["lastMessagePreview"], "hello");
    assert!(list[0]["updatedAt"].is_string());

    let raw = store.storage().get(&messages_key(&id)).unwrap().unwrap();
    let log: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(log[0]["role"], "user");
    assert_eq!(log[0]["content"], "hello");
}

#[test]
fn test_delete_removes_message_log_on_disk() {
    let (storage, tmp) = common::create_temp_sled();
    let deleted = {
        let mut store = ConversationStore::open(storage).unwrap();
        let doomed = store.create_conversation(Some("Scratch")).unwrap().id;
        store
            .append_message(&doomed, MessageLogEntry::user("temp"))
            .unwrap();
        store.delete_conversation(&doomed).unwrap();
        doomed
    };

    let store = ConversationStore::open(common::reopen_sled(&tmp)).unwrap();
    assert!(store.conversation(&deleted).is_none());
    assert!(!store.storage().contains(&messages_key(&deleted)).unwrap());
    assert_eq!(store.list_conversations().len(), 1);
}

#[test]
fn test_corrupt_list_is_replaced_by_default_conversation() {
    let (mut storage, tmp) = common::create_temp_sqlite();
    storage.set(CONVERSATIONS_KEY, "{not json").unwrap();
    drop(storage);

    let store = ConversationStore::open(common::reopen_sqlite(&tmp)).unwrap();
    let conversations = store.list_conversations();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].title, "New conversation 1");
    assert!(conversations[0].is_selected);
}

#[test]
fn test_multiple_persisted_selections_are_repaired() {
    let (mut storage, tmp) = common::create_temp_sqlite();
    let list = r#"[
        {"id":"B","title":"b","updatedAt":"2025-01-02T00:00:00Z","isSelected":true},
        {"id":"A","title":"a","updatedAt":"2025-01-01T00:00:00Z","isSelected":true}
    ]"#;
    storage.set(CONVERSATIONS_KEY, list).unwrap();
    drop(storage);

    let store = ConversationStore::open(common::reopen_sqlite(&tmp)).unwrap();
    assert_eq!(store.selected_conversation_id().as_deref(), Some("B"));
    let selected: Vec<_> = store
        .list_conversations()
        .into_iter()
        .filter(|c| c.is_selected)
        .collect();
    assert_eq!(selected.len(), 1);
}

#[test]
fn test_duplicate_persisted_ids_keep_one_selection() {
    let (mut storage, tmp) = common::create_temp_sqlite();
    let list = r#"[
        {"id":"A","title":"first","updatedAt":"2025-01-02T00:00:00Z","isSelected":false},
        {"id":"A","title":"copy","updatedAt":"2025-01-01T00:00:00Z","isSelected":true},
        {"id":"B","title":"b","updatedAt":"2025-01-01T00:00:00Z","isSelected":false}
    ]"#;
    storage.set(CONVERSATIONS_KEY, list).unwrap();
    drop(storage);

    let store = ConversationStore::open(common::reopen_sqlite(&tmp)).unwrap();
    let conversations = store.list_conversations();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].title, "first");
    assert_eq!(conversations.iter().filter(|c| c.is_selected).count(), 1);
    assert_eq!(store.selected_conversation_id().as_deref(), Some("A"));

    drop(store);
    let reopened = ConversationStore::open(common::reopen_sqlite(&tmp)).unwrap();
    assert_eq!(reopened.list_conversations().len(), 2);
}
