use crate::domain::{chat_store::ChatStore, errors::ChatError, message::Message};

use super::contracts::{map_source_error, ChatBackend};

const SEARCH_RESULT_LIMIT: usize = 20;

/// Full-text search over the current user's channels, newest first. Messages
/// the user deleted for themselves are left out.
pub fn search_messages(
    store: &ChatStore,
    backend: &dyn ChatBackend,
    query: &str,
) -> Result<Vec<Message>, ChatError> {
    let user_id = store.current_user_id()?;
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let found = backend
        .search_messages(user_id, query, SEARCH_RESULT_LIMIT)
        .map_err(map_source_error)?;

    Ok(found
        .into_iter()
        .filter(|message| message.is_visible_to(user_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{message::fixtures::message, user::User},
        infra::stubs::StubChatBackend,
    };

    fn store() -> ChatStore {
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store
    }

    #[test]
    fn blank_query_skips_backend() {
        let backend = StubChatBackend::default();

        let found = search_messages(&store(), &backend, "   ").expect("search should run");

        assert!(found.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn hides_messages_deleted_for_self() {
        let mut hidden = message("2", "c1", "alice", "homework due", 1);
        hidden.deleted_for_sender = true;
        let backend = StubChatBackend::with_rows(vec![
            message("1", "c1", "bob", "Homework tips", 0),
            hidden,
        ]);

        let found = search_messages(&store(), &backend, "homework").expect("search should run");

        let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(backend.calls(), vec!["search_messages:alice:homework:20"]);
    }
}
