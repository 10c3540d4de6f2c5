use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    channel::ChannelId,
    user::{UserId, UserProfile},
};

const TEMP_ID_PREFIX: &str = "temp-";
const DELETED_PLACEHOLDER: &str = "This message was deleted";
const PREVIEW_MAX_CHARS: usize = 48;

/// Message identifier. Optimistic messages carry a locally generated
/// `temp-<uuid>` id until the server assigns the canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    File,
    Forwarded,
    System,
}

impl MessageType {
    pub fn display_label(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::File => Some("[File]"),
            Self::Forwarded => Some("[Forwarded]"),
            Self::System => Some("[System]"),
        }
    }
}

/// Outcome of a reaction toggle for the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    Added,
    Removed,
}

/// Emoji → reacting users. Every key maps to a non-empty set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reactions(BTreeMap<String, BTreeSet<UserId>>);

impl Reactions {
    pub fn toggle(&mut self, emoji: &str, user_id: &str) -> ReactionChange {
        if let Some(users) = self.0.get_mut(emoji) {
            if users.remove(user_id) {
                if users.is_empty() {
                    self.0.remove(emoji);
                }
                return ReactionChange::Removed;
            }

            users.insert(user_id.to_owned());
            return ReactionChange::Added;
        }

        self.0
            .insert(emoji.to_owned(), BTreeSet::from([user_id.to_owned()]));
        ReactionChange::Added
    }

    pub fn users(&self, emoji: &str) -> Option<&BTreeSet<UserId>> {
        self.0.get(emoji)
    }

    #[cfg(test)]
    pub fn has_reacted(&self, emoji: &str, user_id: &str) -> bool {
        self.0
            .get(emoji)
            .is_some_and(|users| users.contains(user_id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<UserId>)> {
        self.0.iter().map(|(emoji, users)| (emoji.as_str(), users))
    }

    /// Drops keys whose user set is empty (rows written by other clients may carry them).
    pub fn prune_empty(&mut self) {
        self.0.retain(|_, users| !users.is_empty());
    }

    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(emoji, users)| format!("{emoji} {}", users.len()))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Delivery state shown next to the viewer's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Seen,
}

impl DeliveryStatus {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Pending => "…",
            Self::Sent => "✓",
            Self::Seen => "✓✓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender: Option<UserProfile>,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_for_everyone: bool,
    #[serde(default)]
    pub deleted_for_sender: bool,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
    #[serde(default)]
    pub forwarded_from: Option<MessageId>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub seen_by: BTreeSet<UserId>,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.id.is_temporary()
    }

    pub fn is_own(&self, viewer_id: &str) -> bool {
        self.sender_id == viewer_id
    }

    /// Deleted-for-sender only hides the message from its sender.
    pub fn is_visible_to(&self, viewer_id: &str) -> bool {
        !(self.deleted_for_sender && self.is_own(viewer_id))
    }

    pub fn is_seen_by(&self, user_id: &str) -> bool {
        self.seen_by.contains(user_id)
    }

    /// Returns true when the user was not already in `seen_by`.
    pub fn mark_seen(&mut self, user_id: &str) -> bool {
        self.seen_by.insert(user_id.to_owned())
    }

    pub fn sender_name(&self) -> &str {
        self.sender
            .as_ref()
            .map(|profile| profile.display_name.as_str())
            .unwrap_or(self.sender_id.as_str())
    }

    pub fn display_content(&self) -> String {
        if self.deleted_for_everyone {
            return DELETED_PLACEHOLDER.to_owned();
        }

        match self.message_type.display_label() {
            Some(label) => format!("{label} {}", self.content),
            None => self.content.clone(),
        }
    }

    pub fn preview(&self) -> String {
        let content = self.display_content();
        if content.chars().count() <= PREVIEW_MAX_CHARS {
            return content;
        }

        let mut truncated: String = content.chars().take(PREVIEW_MAX_CHARS - 1).collect();
        truncated.push('…');
        truncated
    }

    pub fn delivery_status(&self) -> DeliveryStatus {
        if self.is_pending() {
            DeliveryStatus::Pending
        } else if self.seen_by.iter().any(|user| *user != self.sender_id) {
            DeliveryStatus::Seen
        } else {
            DeliveryStatus::Sent
        }
    }

    /// Takes server fields over local ones. `seen_by` only grows and deletion
    /// tombstones never revert.
    pub fn merge_server(&mut self, incoming: Message) {
        let mut seen_by = std::mem::take(&mut self.seen_by);
        seen_by.extend(incoming.seen_by.iter().cloned());
        let deleted_for_everyone = self.deleted_for_everyone || incoming.deleted_for_everyone;
        let deleted_for_sender = self.deleted_for_sender || incoming.deleted_for_sender;
        let sender = incoming.sender.clone().or_else(|| self.sender.take());

        *self = incoming;
        self.seen_by = seen_by;
        self.deleted_for_everyone = deleted_for_everyone;
        self.deleted_for_sender = deleted_for_sender;
        self.sender = sender;
        self.reactions.prune_empty();
    }
}

/// Insert payload for the durable message write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub reply_to: Option<MessageId>,
    pub forwarded_from: Option<MessageId>,
}

impl NewMessage {
    pub fn from_optimistic(message: &Message) -> Self {
        Self {
            channel_id: message.channel_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            message_type: message.message_type,
            reply_to: message.reply_to.clone(),
            forwarded_from: message.forwarded_from.clone(),
        }
    }
}
