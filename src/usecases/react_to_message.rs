use crate::domain::{chat_store::ChatStore, errors::ChatError, message::MessageId};

use super::contracts::{map_source_error, ChatBackend};

const MESSAGE_REACTION_FAILED: &str = "CHAT_MESSAGE_REACTION_FAILED";

/// Toggles the current user's `emoji` on a message. The whole reaction
/// mapping is written at once; concurrent toggles resolve last-write-wins.
pub fn toggle_reaction(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    message_id: &MessageId,
    emoji: &str,
) -> Result<(), ChatError> {
    let request = store.prepare_reaction(message_id, emoji)?;

    let outcome = backend
        .replace_reactions(&request.message_id, &request.reactions)
        .map_err(map_source_error);
    if let Err(error) = &outcome {
        tracing::warn!(
            code = MESSAGE_REACTION_FAILED,
            message_id = %request.message_id,
            error = %error,
            "reaction write failed"
        );
    }

    store.apply_reaction(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{channel::fixtures::group, message::fixtures::message, user::User},
        infra::stubs::StubChatBackend,
        usecases::contracts::BackendError,
    };

    fn setup() -> (ChatStore, StubChatBackend) {
        let mut existing = message("1", "c1", "bob", "nice", 0);
        existing.reactions.toggle("👍", "bob");
        let rows = vec![existing];
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_channels(vec![group("c1", "General", &["alice", "bob"])]);
        store.load_messages("c1", rows.clone());
        (store, StubChatBackend::with_rows(rows))
    }

    #[test]
    fn toggling_twice_restores_original_mapping() {
        let (mut store, backend) = setup();
        let id = MessageId::new("1");
        let original = store.cache().messages("c1")[0].reactions.clone();

        toggle_reaction(&mut store, &backend, &id, "👍").expect("first toggle");
        assert!(store.cache().messages("c1")[0].reactions.has_reacted("👍", "alice"));

        toggle_reaction(&mut store, &backend, &id, "👍").expect("second toggle");
        assert_eq!(store.cache().messages("c1")[0].reactions, original);
    }

    #[test]
    fn distinct_emoji_accumulate_for_same_user() {
        let (mut store, backend) = setup();
        let id = MessageId::new("1");

        toggle_reaction(&mut store, &backend, &id, "👍").expect("thumbs");
        toggle_reaction(&mut store, &backend, &id, "🎉").expect("party");

        let reactions = &store.cache().messages("c1")[0].reactions;
        assert!(reactions.has_reacted("👍", "alice"));
        assert!(reactions.has_reacted("🎉", "alice"));
        assert_eq!(backend.row("1").map(|row| row.reactions), Some(reactions.clone()));
    }

    #[test]
    fn failed_write_leaves_reactions_unchanged() {
        let (mut store, backend) = setup();
        backend.fail_writes(BackendError::Unauthorized);

        let result = toggle_reaction(&mut store, &backend, &MessageId::new("1"), "👍");

        assert_eq!(result, Err(ChatError::Unauthorized));
        assert!(!store.cache().messages("c1")[0].reactions.has_reacted("👍", "alice"));
        assert!(store.error().is_some());
    }
}
