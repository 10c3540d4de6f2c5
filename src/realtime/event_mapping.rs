use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};

use crate::domain::{
    channel::ChannelId,
    chat_store::ChatStore,
    events::{PushEvent, PushEventType, PushTable},
    message::{Message, MessageId},
    typing::TypingRow,
    user::{PresenceRow, UserId},
};

const PUSH_ROW_UNDECODABLE: &str = "PUSH_ROW_UNDECODABLE";
const PUSH_ROW_MISSING: &str = "PUSH_ROW_MISSING";

/// What a push event changed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEffect {
    Message { channel_id: ChannelId },
    Presence { user_id: UserId },
    Typing { channel_id: ChannelId },
    Ignored,
}

#[derive(Debug, Deserialize)]
struct MessageKey {
    id: MessageId,
}

#[derive(Debug, Deserialize)]
struct PresenceKey {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct TypingKey {
    user_id: UserId,
    #[serde(alias = "chat_id")]
    channel_id: ChannelId,
}

/// Applies one push event through the store's mutation primitives. Rows that
/// cannot be decoded are logged and skipped.
pub fn apply_push_event(
    store: &mut ChatStore,
    event: PushEvent,
    received_at: DateTime<Utc>,
) -> PushEffect {
    let table = event.table;
    match (table, event.event_type) {
        (PushTable::Messages, PushEventType::Insert) => {
            let Some(message) = decode::<Message>(table, event.new_row) else {
                return PushEffect::Ignored;
            };
            let channel_id = message.channel_id.clone();
            store.apply_confirmed_insert(message);
            PushEffect::Message { channel_id }
        }
        (PushTable::Messages, PushEventType::Update) => {
            let Some(message) = decode::<Message>(table, event.new_row) else {
                return PushEffect::Ignored;
            };
            let channel_id = message.channel_id.clone();
            if store.apply_confirmed_update(message) {
                PushEffect::Message { channel_id }
            } else {
                PushEffect::Ignored
            }
        }
        (PushTable::Messages, PushEventType::Delete) => {
            let Some(key) = decode::<MessageKey>(table, event.old_row) else {
                return PushEffect::Ignored;
            };
            let channel_id = store.cache().find(&key.id).map(|m| m.channel_id.clone());
            match channel_id {
                Some(channel_id) if store.apply_remote_delete(&key.id) => {
                    PushEffect::Message { channel_id }
                }
                _ => PushEffect::Ignored,
            }
        }
        (PushTable::Presence, PushEventType::Insert | PushEventType::Update) => {
            let Some(row) = decode::<PresenceRow>(table, event.new_row) else {
                return PushEffect::Ignored;
            };
            store.apply_presence(&row);
            PushEffect::Presence {
                user_id: row.user_id,
            }
        }
        (PushTable::Presence, PushEventType::Delete) => {
            let Some(key) = decode::<PresenceKey>(table, event.old_row) else {
                return PushEffect::Ignored;
            };
            store.apply_presence(&PresenceRow {
                user_id: key.user_id.clone(),
                is_online: false,
                last_seen: received_at,
            });
            PushEffect::Presence {
                user_id: key.user_id,
            }
        }
        (PushTable::Typing, PushEventType::Insert | PushEventType::Update) => {
            let Some(row) = decode::<TypingRow>(table, event.new_row) else {
                return PushEffect::Ignored;
            };
            store.apply_typing(&row, received_at);
            PushEffect::Typing {
                channel_id: row.channel_id,
            }
        }
        (PushTable::Typing, PushEventType::Delete) => {
            let Some(key) = decode::<TypingKey>(table, event.old_row) else {
                return PushEffect::Ignored;
            };
            store.remove_typing(&key.channel_id, &key.user_id);
            PushEffect::Typing {
                channel_id: key.channel_id,
            }
        }
    }
}

fn decode<T: DeserializeOwned>(table: PushTable, row: Option<serde_json::Value>) -> Option<T> {
    let Some(row) = row else {
        tracing::warn!(
            code = PUSH_ROW_MISSING,
            table = table.as_label(),
            "push event carried no row"
        );
        return None;
    };

    match serde_json::from_value(row) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            tracing::warn!(
                code = PUSH_ROW_UNDECODABLE,
                table = table.as_label(),
                error = %error,
                "push row could not be decoded; skipping"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        channel::fixtures::group,
        chat_store::SendDraft,
        message::fixtures::{at, message},
        user::User,
    };

    fn store() -> ChatStore {
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store.set_users(vec![User::new("bob", "Bob")]);
        store.set_channels(vec![group("c1", "General", &["alice", "bob"])]);
        store.load_messages("c1", vec![]);
        store
    }

    fn insert(row: &Message) -> PushEvent {
        PushEvent::insert(PushTable::Messages, row).expect("event should build")
    }

    #[test]
    fn push_insert_never_duplicates_own_pending_message() {
        let mut store = store();
        store
            .begin_send(SendDraft::text(Some("c1"), "hello"), at(10))
            .expect("send should begin");

        let effect = apply_push_event(&mut store, insert(&message("42", "c1", "alice", "hello", 11)), at(11));

        assert_eq!(effect, PushEffect::Message { channel_id: "c1".to_owned() });
        let cached = store.cache().messages("c1");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id.as_str(), "42");
    }

    #[test]
    fn update_merges_seen_by_and_keeps_tombstone() {
        let mut store = store();
        let mut original = message("1", "c1", "bob", "hi", 0);
        original.deleted_for_everyone = true;
        apply_push_event(&mut store, insert(&original), at(0));
        store.mark_channel_seen("c1");

        let mut update = message("1", "c1", "bob", "hi", 0);
        update.mark_seen("carol");
        apply_push_event(
            &mut store,
            PushEvent::update(PushTable::Messages, &update).expect("event should build"),
            at(1),
        );

        let cached = &store.cache().messages("c1")[0];
        assert!(cached.is_seen_by("alice"));
        assert!(cached.is_seen_by("carol"));
        assert!(cached.deleted_for_everyone);
    }

    #[test]
    fn update_for_unknown_message_is_ignored() {
        let mut store = store();

        let effect = apply_push_event(
            &mut store,
            PushEvent::update(PushTable::Messages, &message("9", "c1", "bob", "?", 0))
                .expect("event should build"),
            at(0),
        );

        assert_eq!(effect, PushEffect::Ignored);
        assert!(store.cache().messages("c1").is_empty());
    }

    #[test]
    fn delete_event_tombstones_message() {
        let mut store = store();
        apply_push_event(&mut store, insert(&message("1", "c1", "bob", "hi", 0)), at(0));

        let effect = apply_push_event(
            &mut store,
            PushEvent::delete(PushTable::Messages, &serde_json::json!({"id": "1"}))
                .expect("event should build"),
            at(1),
        );

        assert_eq!(effect, PushEffect::Message { channel_id: "c1".to_owned() });
        assert!(store.cache().messages("c1")[0].deleted_for_everyone);
    }

    #[test]
    fn undecodable_rows_are_skipped() {
        let mut store = store();
        let event = PushEvent {
            event_type: PushEventType::Insert,
            table: PushTable::Messages,
            old_row: None,
            new_row: Some(serde_json::json!({"id": 7, "content": ["not", "text"]})),
        };

        assert_eq!(apply_push_event(&mut store, event, at(0)), PushEffect::Ignored);
        assert!(store.cache().messages("c1").is_empty());
    }

    #[test]
    fn presence_events_drive_online_set() {
        let mut store = store();
        let row = PresenceRow {
            user_id: "bob".to_owned(),
            is_online: true,
            last_seen: at(0),
        };

        apply_push_event(
            &mut store,
            PushEvent::insert(PushTable::Presence, &row).expect("event should build"),
            at(0),
        );
        assert!(store.presence().is_online("bob"));

        apply_push_event(
            &mut store,
            PushEvent::delete(PushTable::Presence, &serde_json::json!({"user_id": "bob"}))
                .expect("event should build"),
            at(120),
        );
        assert!(!store.presence().is_online("bob"));
        assert_eq!(store.presence().last_seen_label("bob", at(240)), "last seen 2 minutes ago");
    }

    #[test]
    fn typing_events_add_and_remove_entries() {
        let mut store = store();
        let row = TypingRow {
            user_id: "bob".to_owned(),
            channel_id: "c1".to_owned(),
            is_typing: true,
            updated_at: at(0),
        };

        apply_push_event(
            &mut store,
            PushEvent::insert(PushTable::Typing, &row).expect("event should build"),
            at(0),
        );
        assert_eq!(store.typing_indicator("c1"), Some("Bob is typing...".to_owned()));

        apply_push_event(
            &mut store,
            PushEvent::delete(
                PushTable::Typing,
                &serde_json::json!({"user_id": "bob", "chat_id": "c1"}),
            )
            .expect("event should build"),
            at(1),
        );
        assert_eq!(store.typing_indicator("c1"), None);
    }
}
