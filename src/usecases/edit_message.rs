use chrono::{DateTime, Utc};

use crate::domain::{chat_store::ChatStore, errors::ChatError, message::MessageId};

use super::contracts::{map_source_error, ChatBackend};

const MESSAGE_EDIT_FAILED: &str = "CHAT_MESSAGE_EDIT_FAILED";

/// Replaces the content of one of the current user's messages. The cache only
/// changes once the backend confirms the edit.
pub fn edit_message(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    message_id: &MessageId,
    content: &str,
    now: DateTime<Utc>,
) -> Result<(), ChatError> {
    let request = store.prepare_edit(message_id, content)?;

    let outcome = backend
        .update_message_content(&request.message_id, &request.content, now)
        .map_err(map_source_error);
    if let Err(error) = &outcome {
        tracing::warn!(
            code = MESSAGE_EDIT_FAILED,
            message_id = %request.message_id,
            error = %error,
            "message edit failed"
        );
    }

    store.apply_edit(outcome, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            channel::fixtures::group,
            message::fixtures::{at, message},
            user::User,
        },
        infra::stubs::StubChatBackend,
        usecases::contracts::BackendError,
    };

    fn setup() -> (ChatStore, StubChatBackend) {
        let rows = vec![
            message("1", "c1", "alice", "helo", 0),
            message("2", "c1", "bob", "hey", 1),
        ];
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_channels(vec![group("c1", "General", &["alice", "bob"])]);
        store.load_messages("c1", rows.clone());
        (store, StubChatBackend::with_rows(rows))
    }

    #[test]
    fn confirmed_edit_updates_cached_content() {
        let (mut store, backend) = setup();

        edit_message(&mut store, &backend, &MessageId::new("1"), " hello ", at(9))
            .expect("edit should succeed");

        let cached = &store.cache().messages("c1")[0];
        assert_eq!(cached.content, "hello");
        assert!(cached.edited);
        assert_eq!(cached.edited_at, Some(at(9)));
    }

    #[test]
    fn failed_edit_leaves_message_untouched_and_sets_error() {
        let (mut store, backend) = setup();
        backend.fail_writes(BackendError::Unavailable);

        let result = edit_message(&mut store, &backend, &MessageId::new("1"), "hello", at(9));

        assert_eq!(result, Err(ChatError::TemporarilyUnavailable));
        assert_eq!(store.cache().messages("c1")[0].content, "helo");
        assert!(store.error().is_some());
    }

    #[test]
    fn editing_someone_elses_message_is_rejected_before_write() {
        let (mut store, backend) = setup();

        let result = edit_message(&mut store, &backend, &MessageId::new("2"), "mine now", at(9));

        assert_eq!(result, Err(ChatError::NotMessageSender));
        assert!(backend.calls().is_empty());
        assert_eq!(store.error(), None);
    }
}
