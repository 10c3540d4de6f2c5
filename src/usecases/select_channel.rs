use crate::domain::{chat_store::ChatStore, errors::ChatError};

use super::{
    contracts::ChatBackend,
    load_messages::{load_messages, LoadMessagesQuery},
};

const SEEN_WRITE_FAILED: &str = "CHAT_SEEN_WRITE_FAILED";

/// Selects a channel, loads its history and marks it read.
pub fn open_channel(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    channel_id: &str,
) -> Result<(), ChatError> {
    store.select_channel(channel_id)?;
    let query = LoadMessagesQuery {
        limit: store.history_limit(),
        ..LoadMessagesQuery::new(channel_id)
    };
    load_messages(store, backend, query)?;
    mark_channel_seen(store, backend, channel_id);
    Ok(())
}

/// Adds the current user to `seen_by` of every visible message in the
/// channel. The local mark stands even if persisting it fails.
pub fn mark_channel_seen(store: &mut ChatStore, backend: &dyn ChatBackend, channel_id: &str) {
    let marked = store.mark_channel_seen(channel_id);
    if marked.is_empty() {
        return;
    }

    let Ok(user_id) = store.current_user_id() else {
        return;
    };

    if let Err(error) = backend.add_seen_by(&marked, user_id) {
        tracing::warn!(
            code = SEEN_WRITE_FAILED,
            channel_id,
            count = marked.len(),
            error = %error,
            "seen receipts were not persisted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            channel::fixtures::group,
            chat_store::StoreSettings,
            message::{fixtures::message, MessageId},
            user::User,
        },
        infra::stubs::StubChatBackend,
        usecases::contracts::BackendError,
    };

    fn store() -> ChatStore {
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_channels(vec![
            group("c1", "General", &["alice", "bob"]),
            group("c2", "Physics", &["alice", "bob"]),
        ]);
        store
    }

    #[test]
    fn opening_channel_loads_history_and_marks_it_seen() {
        let mut store = store();
        let backend = StubChatBackend::with_rows(vec![
            message("1", "c1", "bob", "hi", 0),
            message("2", "c1", "alice", "hey", 1),
        ]);

        open_channel(&mut store, &backend, "c1").expect("open should succeed");

        assert_eq!(store.selected_channel_id(), Some("c1"));
        assert!(store.cache().messages("c1").iter().all(|m| m.is_seen_by("alice")));
        assert_eq!(store.directory().get("c1").map(|c| c.unread_count), Some(0));
        assert_eq!(
            backend.seen_marks(),
            vec![
                (MessageId::new("1"), "alice".to_owned()),
                (MessageId::new("2"), "alice".to_owned()),
            ]
        );
    }

    #[test]
    fn history_page_size_follows_store_settings() {
        let mut store = ChatStore::new(StoreSettings {
            history_limit: 20,
            ..StoreSettings::default()
        });
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_channels(vec![group("c1", "General", &["alice"])]);
        let backend = StubChatBackend::default();

        open_channel(&mut store, &backend, "c1").expect("open should succeed");

        assert!(backend.calls().contains(&"list_messages:c1:20".to_owned()));
    }

    #[test]
    fn unknown_channel_is_rejected_before_loading() {
        let mut store = store();
        let backend = StubChatBackend::default();

        let result = open_channel(&mut store, &backend, "nope");

        assert_eq!(result, Err(ChatError::ChannelNotFound("nope".to_owned())));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn seen_marks_survive_a_failed_write() {
        let mut store = store();
        store.load_messages("c2", vec![message("5", "c2", "bob", "ping", 0)]);
        let backend = StubChatBackend::default();
        backend.fail_writes(BackendError::Unavailable);

        mark_channel_seen(&mut store, &backend, "c2");

        assert!(store.cache().messages("c2")[0].is_seen_by("alice"));
        assert_eq!(store.error(), None);
    }
}
