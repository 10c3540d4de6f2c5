use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{channel::ChannelId, user::UserId};

/// Typing row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingRow {
    pub user_id: UserId,
    #[serde(alias = "chat_id")]
    pub channel_id: ChannelId,
    pub is_typing: bool,
    pub updated_at: DateTime<Utc>,
}

/// Local typing transition to publish for the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    pub channel_id: ChannelId,
    pub is_typing: bool,
}

impl TypingSignal {
    fn started(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_owned(),
            is_typing: true,
        }
    }

    fn stopped(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_owned(),
            is_typing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RemoteEntry {
    updated_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TypingTracker {
    idle_window: Duration,
    stale_after: Duration,
    remote: HashMap<ChannelId, HashMap<UserId, RemoteEntry>>,
    /// Channels where the current user is flagged as typing, with the last keystroke.
    local: HashMap<ChannelId, DateTime<Utc>>,
}

impl TypingTracker {
    pub fn new(idle_window: Duration, stale_after: Duration) -> Self {
        Self {
            idle_window,
            stale_after,
            remote: HashMap::new(),
            local: HashMap::new(),
        }
    }

    /// Applies an inbound typing row. Older rows never override newer ones,
    /// stop rows included; a current `is_typing = false` removes the entry.
    pub fn apply(&mut self, row: &TypingRow, received_at: DateTime<Utc>) {
        let superseded = self
            .remote
            .get(&row.channel_id)
            .and_then(|users| users.get(&row.user_id))
            .is_some_and(|entry| entry.updated_at > row.updated_at);
        if superseded {
            return;
        }

        if !row.is_typing {
            self.remove(&row.channel_id, &row.user_id);
            return;
        }

        let users = self.remote.entry(row.channel_id.clone()).or_default();

        users.insert(
            row.user_id.clone(),
            RemoteEntry {
                updated_at: row.updated_at,
                received_at,
            },
        );
    }

    pub fn remove(&mut self, channel_id: &str, user_id: &str) {
        if let Some(users) = self.remote.get_mut(channel_id) {
            users.remove(user_id);
            if users.is_empty() {
                self.remote.remove(channel_id);
            }
        }
    }

    /// Drops remote entries that received no refresh within the staleness window.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let stale_after = self.stale_after;
        let mut expired = 0;

        self.remote.retain(|_, users| {
            let before = users.len();
            users.retain(|_, entry| now - entry.received_at < stale_after);
            expired += before - users.len();
            !users.is_empty()
        });

        expired
    }

    pub fn typing_users(&self, channel_id: &str, viewer_id: &str) -> Vec<&UserId> {
        let mut users: Vec<&UserId> = self
            .remote
            .get(channel_id)
            .map(|users| users.keys().filter(|user| user.as_str() != viewer_id).collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    /// Records a keystroke. Signals only on the not-typing → typing transition.
    pub fn on_input(&mut self, channel_id: &str, now: DateTime<Utc>) -> Option<TypingSignal> {
        match self.local.insert(channel_id.to_owned(), now) {
            Some(_) => None,
            None => Some(TypingSignal::started(channel_id)),
        }
    }

    /// Trailing edge: channels idle for the whole window stop typing.
    pub fn poll_idle(&mut self, now: DateTime<Utc>) -> Vec<TypingSignal> {
        let idle_window = self.idle_window;
        let mut idle: Vec<ChannelId> = self
            .local
            .iter()
            .filter(|(_, last_input)| now - **last_input >= idle_window)
            .map(|(channel_id, _)| channel_id.clone())
            .collect();
        idle.sort();

        idle.iter()
            .filter_map(|channel_id| self.stop_local(channel_id))
            .collect()
    }

    pub fn stop_local(&mut self, channel_id: &str) -> Option<TypingSignal> {
        self.local
            .remove(channel_id)
            .map(|_| TypingSignal::stopped(channel_id))
    }

    #[cfg(test)]
    pub fn is_locally_typing(&self, channel_id: &str) -> bool {
        self.local.contains_key(channel_id)
    }
}

/// "Ada is typing..." for one user, a head count for several.
pub fn typing_indicator(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [single] => Some(format!("{single} is typing...")),
        many => Some(format!("{} people are typing...", many.len())),
    }
}
