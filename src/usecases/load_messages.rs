use crate::domain::{chat_store::ChatStore, errors::ChatError};

use super::contracts::{map_source_error, ChatBackend};

const DEFAULT_MESSAGES_PAGE_SIZE: usize = 50;
const MAX_MESSAGES_PAGE_SIZE: usize = 200;
const MESSAGES_LOAD_FAILED: &str = "CHAT_MESSAGES_LOAD_FAILED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub channel_id: String,
    pub limit: usize,
}

impl LoadMessagesQuery {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            limit: DEFAULT_MESSAGES_PAGE_SIZE,
        }
    }

    fn normalized_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_MESSAGES_PAGE_SIZE,
            value if value > MAX_MESSAGES_PAGE_SIZE => MAX_MESSAGES_PAGE_SIZE,
            value => value,
        }
    }
}

/// Replaces the cached history of a channel with the backend's latest page.
/// Returns the number of messages now cached for the channel.
pub fn load_messages(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    query: LoadMessagesQuery,
) -> Result<usize, ChatError> {
    let limit = query.normalized_limit();

    match backend.list_messages(&query.channel_id, limit) {
        Ok(messages) => {
            store.load_messages(&query.channel_id, messages);
            Ok(store.cache().messages(&query.channel_id).len())
        }
        Err(error) => {
            let error = map_source_error(error);
            tracing::warn!(
                code = MESSAGES_LOAD_FAILED,
                channel_id = %query.channel_id,
                error = %error,
                "message history load failed"
            );
            store.set_error(format!("Failed to load messages: {error}"));
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{channel::fixtures::group, message::fixtures::message, user::User},
        infra::stubs::StubChatBackend,
        usecases::contracts::BackendError,
    };

    fn store() -> ChatStore {
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_channels(vec![group("c1", "General", &["alice", "bob"])]);
        store
    }

    #[test]
    fn uses_default_limit_when_query_limit_is_zero() {
        let mut store = store();
        let backend = StubChatBackend::default();

        load_messages(
            &mut store,
            &backend,
            LoadMessagesQuery {
                channel_id: "c1".to_owned(),
                limit: 0,
            },
        )
        .expect("load should succeed");

        assert_eq!(backend.calls(), vec!["list_messages:c1:50"]);
    }

    #[test]
    fn caps_limit_to_maximum_boundary() {
        let mut store = store();
        let backend = StubChatBackend::default();

        load_messages(
            &mut store,
            &backend,
            LoadMessagesQuery {
                channel_id: "c1".to_owned(),
                limit: 999,
            },
        )
        .expect("load should succeed");

        assert_eq!(backend.calls(), vec!["list_messages:c1:200"]);
    }

    #[test]
    fn loaded_rows_replace_cached_history() {
        let mut store = store();
        store.load_messages("c1", vec![message("old", "c1", "bob", "stale", 0)]);
        let backend = StubChatBackend::with_rows(vec![
            message("2", "c1", "bob", "second", 2),
            message("1", "c1", "bob", "first", 1),
        ]);

        let count = load_messages(&mut store, &backend, LoadMessagesQuery::new("c1"))
            .expect("load should succeed");

        assert_eq!(count, 2);
        let ids: Vec<_> = store.cache().messages("c1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(store.directory().get("c1").map(|c| c.unread_count), Some(2));
    }

    #[test]
    fn failure_sets_error_and_keeps_cache() {
        let mut store = store();
        store.load_messages("c1", vec![message("1", "c1", "bob", "kept", 0)]);
        let backend = StubChatBackend::default();
        backend.fail_reads(BackendError::Unavailable);

        let result = load_messages(&mut store, &backend, LoadMessagesQuery::new("c1"));

        assert_eq!(result, Err(ChatError::TemporarilyUnavailable));
        assert_eq!(store.cache().messages("c1").len(), 1);
        assert!(store.error().is_some());
    }
}
