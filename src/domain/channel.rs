use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    message::{Message, MessageId},
    user::{User, UserId},
};

pub type ChannelId = String;

/// Denormalized pointer to the newest message of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Absent for direct 1:1 channels.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_announcement: bool,
    #[serde(default)]
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    /// Derived for the viewing user, never read from the backend.
    #[serde(skip)]
    pub unread_count: u32,
}

impl Channel {
    pub fn is_direct(&self) -> bool {
        !self.is_group && self.name.is_none()
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.participants.iter().any(|participant| participant == user_id)
    }

    /// The other participant of a direct channel.
    pub fn counterpart<'a>(&'a self, viewer_id: &str) -> Option<&'a UserId> {
        if !self.is_direct() {
            return None;
        }

        self.participants
            .iter()
            .find(|participant| participant.as_str() != viewer_id)
    }

    /// Direct channels take the counterpart's display name; `lookup` resolves user ids.
    pub fn display_name<'u, F>(&self, viewer_id: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'u User>,
    {
        if let Some(name) = self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            return name.to_owned();
        }

        match self.counterpart(viewer_id) {
            Some(user_id) => lookup(user_id)
                .map(|user| user.display_name.clone())
                .unwrap_or_else(|| user_id.clone()),
            None => "Unnamed channel".to_owned(),
        }
    }

    /// Keeps `last_message_at` monotonic; older messages never replace the pointer.
    pub fn touch_last_message(&mut self, message: &Message) {
        if self
            .last_message_at
            .is_some_and(|current| current > message.created_at)
        {
            return;
        }

        self.set_last_message(message);
    }

    pub fn set_last_message(&mut self, message: &Message) {
        self.last_message_at = Some(message.created_at);
        self.last_message = Some(LastMessage {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            preview: message.preview(),
        });
    }
}
