use std::sync::mpsc::Sender;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    channel::Channel,
    chat_store::ChatStore,
    errors::ChatError,
    events::{AppEvent, PushEvent, PushTable},
    message::{Message, MessageId, NewMessage, Reactions},
    shell_state::ShellState,
    typing::TypingRow,
    user::{PresenceRow, User},
};

pub trait AppEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>>;
}

pub trait ShellOrchestrator {
    fn state(&self) -> &ShellState;
    fn state_mut(&mut self) -> &mut ShellState;
    fn store(&self) -> &ChatStore;
    fn handle_event(&mut self, event: AppEvent) -> Result<()>;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Failures reported by the durable row store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("row not found")]
    NotFound,
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("unavailable")]
    Unavailable,
}

/// Durable row store. Every write returns the canonical row.
pub trait ChatBackend {
    /// Channels the user participates in, with per-viewer unread counts.
    fn list_channels(&self, user_id: &str) -> Result<Vec<Channel>, BackendError>;
    fn list_users(&self) -> Result<Vec<User>, BackendError>;
    /// Most recent `limit` messages, oldest first.
    fn list_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>, BackendError>;
    fn fetch_message(&self, message_id: &MessageId) -> Result<Message, BackendError>;
    fn insert_message(&self, payload: &NewMessage) -> Result<Message, BackendError>;
    fn update_message_content(
        &self,
        message_id: &MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, BackendError>;
    fn mark_deleted(&self, message_id: &MessageId, for_everyone: bool)
        -> Result<Message, BackendError>;
    fn replace_reactions(
        &self,
        message_id: &MessageId,
        reactions: &Reactions,
    ) -> Result<Message, BackendError>;
    fn add_seen_by(&self, message_ids: &[MessageId], user_id: &str) -> Result<(), BackendError>;
    fn upsert_presence(&self, row: &PresenceRow) -> Result<(), BackendError>;
    fn upsert_typing(&self, row: &TypingRow) -> Result<(), BackendError>;
    /// Newest first, restricted to channels the user participates in.
    fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError>;
}

impl<T> ChatBackend for &T
where
    T: ChatBackend + ?Sized,
{
    fn list_channels(&self, user_id: &str) -> Result<Vec<Channel>, BackendError> {
        (*self).list_channels(user_id)
    }

    fn list_users(&self) -> Result<Vec<User>, BackendError> {
        (*self).list_users()
    }

    fn list_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>, BackendError> {
        (*self).list_messages(channel_id, limit)
    }

    fn fetch_message(&self, message_id: &MessageId) -> Result<Message, BackendError> {
        (*self).fetch_message(message_id)
    }

    fn insert_message(&self, payload: &NewMessage) -> Result<Message, BackendError> {
        (*self).insert_message(payload)
    }

    fn update_message_content(
        &self,
        message_id: &MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, BackendError> {
        (*self).update_message_content(message_id, content, edited_at)
    }

    fn mark_deleted(
        &self,
        message_id: &MessageId,
        for_everyone: bool,
    ) -> Result<Message, BackendError> {
        (*self).mark_deleted(message_id, for_everyone)
    }

    fn replace_reactions(
        &self,
        message_id: &MessageId,
        reactions: &Reactions,
    ) -> Result<Message, BackendError> {
        (*self).replace_reactions(message_id, reactions)
    }

    fn add_seen_by(&self, message_ids: &[MessageId], user_id: &str) -> Result<(), BackendError> {
        (*self).add_seen_by(message_ids, user_id)
    }

    fn upsert_presence(&self, row: &PresenceRow) -> Result<(), BackendError> {
        (*self).upsert_presence(row)
    }

    fn upsert_typing(&self, row: &TypingRow) -> Result<(), BackendError> {
        (*self).upsert_typing(row)
    }

    fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError> {
        (*self).search_messages(user_id, query, limit)
    }
}

/// Live registration on one push table. Dropping the handle must release it.
pub trait Subscription: Send {
    fn table(&self) -> PushTable;
}

pub trait PushSource {
    fn subscribe(
        &self,
        table: PushTable,
        sink: Sender<PushEvent>,
    ) -> Result<Box<dyn Subscription>, BackendError>;
}

pub trait IdentitySource {
    fn current_user(&self) -> Result<Option<User>, BackendError>;
}

pub(crate) fn map_source_error(error: BackendError) -> ChatError {
    match error {
        BackendError::Unauthorized => ChatError::Unauthorized,
        BackendError::Rejected(reason) => ChatError::Rejected(reason),
        BackendError::NotFound | BackendError::Unavailable => ChatError::TemporarilyUnavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_backend_errors_to_engine_errors() {
        assert_eq!(map_source_error(BackendError::Unauthorized), ChatError::Unauthorized);
        assert_eq!(
            map_source_error(BackendError::Rejected("too long".to_owned())),
            ChatError::Rejected("too long".to_owned())
        );
        assert_eq!(
            map_source_error(BackendError::Unavailable),
            ChatError::TemporarilyUnavailable
        );
    }
}
