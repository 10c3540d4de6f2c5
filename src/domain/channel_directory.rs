use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{
    channel::{Channel, ChannelId, LastMessage},
    message::{Message, MessageId},
    user::User,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastMessageSnapshot {
    last_message_at: Option<DateTime<Utc>>,
    last_message: Option<LastMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDirectory {
    ui_state: DirectoryUiState,
    channels: Vec<Channel>,
    selected_id: Option<ChannelId>,
    search_query: String,
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self {
            ui_state: DirectoryUiState::Loading,
            channels: Vec::new(),
            selected_id: None,
            search_query: String::new(),
        }
    }
}

impl ChannelDirectory {
    pub fn ui_state(&self) -> DirectoryUiState {
        self.ui_state
    }

    /// Announcement channels first, then most recent activity.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn get(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == channel_id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Channel> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_loading(&mut self) {
        self.ui_state = DirectoryUiState::Loading;
    }

    /// Replaces the list; selection survives when the selected channel is still present.
    pub fn set_ready(&mut self, channels: Vec<Channel>) {
        if channels.is_empty() {
            self.ui_state = DirectoryUiState::Empty;
            self.channels.clear();
            self.clear_selection();
            return;
        }

        self.ui_state = DirectoryUiState::Ready;
        self.channels = channels;
        if let Some(selected) = self.selected_id.as_deref() {
            if self.get(selected).is_none() {
                self.clear_selection();
            }
        }
        self.reorder();
    }

    pub fn set_error(&mut self) {
        self.ui_state = DirectoryUiState::Error;
    }

    pub fn select(&mut self, channel_id: &str) -> Option<&Channel> {
        let index = self
            .channels
            .iter()
            .position(|channel| channel.id == channel_id)?;
        self.selected_id = Some(channel_id.to_owned());
        self.channels.get(index)
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Channels matching the search query by name, description or derived direct name.
    pub fn filtered<'u, F>(&self, viewer_id: &str, lookup: F) -> Vec<&Channel>
    where
        F: Fn(&str) -> Option<&'u User>,
    {
        let query = self.search_query.trim().to_lowercase();
        if query.is_empty() {
            return self.channels.iter().collect();
        }

        self.channels
            .iter()
            .filter(|channel| {
                channel
                    .display_name(viewer_id, &lookup)
                    .to_lowercase()
                    .contains(&query)
                    || channel
                        .description
                        .as_deref()
                        .is_some_and(|description| description.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Updates last-message metadata; returns false for unknown channels.
    pub fn record_message(&mut self, message: &Message) -> bool {
        let Some(channel) = self
            .channels
            .iter_mut()
            .find(|channel| channel.id == message.channel_id)
        else {
            return false;
        };

        channel.touch_last_message(message);
        self.reorder();
        true
    }

    /// Points the channel at the confirmed row when it still points at the
    /// optimistic one, even if the server timestamp is older than the local one.
    pub fn replace_last_message(&mut self, temp_id: &MessageId, confirmed: &Message) -> bool {
        let Some(channel) = self
            .channels
            .iter_mut()
            .find(|channel| channel.id == confirmed.channel_id)
        else {
            return false;
        };

        if channel
            .last_message
            .as_ref()
            .is_some_and(|last| last.id == *temp_id)
        {
            channel.set_last_message(confirmed);
        } else {
            channel.touch_last_message(confirmed);
        }
        self.reorder();
        true
    }

    /// Puts back last-message metadata captured before an optimistic send, as
    /// long as the rolled-back message is still the one recorded.
    pub fn restore_last_message(
        &mut self,
        channel_id: &str,
        rolled_back: &MessageId,
        snapshot: LastMessageSnapshot,
    ) {
        let Some(channel) = self.channels.iter_mut().find(|channel| channel.id == channel_id) else {
            return;
        };

        if channel
            .last_message
            .as_ref()
            .is_some_and(|last| last.id == *rolled_back)
        {
            channel.last_message_at = snapshot.last_message_at;
            channel.last_message = snapshot.last_message;
            self.reorder();
        }
    }

    pub fn last_message_snapshot(&self, channel_id: &str) -> LastMessageSnapshot {
        self.get(channel_id)
            .map(|channel| LastMessageSnapshot {
                last_message_at: channel.last_message_at,
                last_message: channel.last_message.clone(),
            })
            .unwrap_or_default()
    }

    pub fn set_unread(&mut self, channel_id: &str, count: u32) {
        if let Some(channel) = self.channels.iter_mut().find(|channel| channel.id == channel_id) {
            channel.unread_count = count;
        }
    }

    pub fn increment_unread(&mut self, channel_id: &str) {
        if let Some(channel) = self.channels.iter_mut().find(|channel| channel.id == channel_id) {
            channel.unread_count = channel.unread_count.saturating_add(1);
        }
    }

    pub fn total_unread(&self) -> u32 {
        self.channels
            .iter()
            .map(|channel| channel.unread_count)
            .fold(0, u32::saturating_add)
    }

    fn reorder(&mut self) {
        self.channels.sort_by(compare_channels);
    }
}

fn compare_channels(left: &Channel, right: &Channel) -> Ordering {
    right
        .is_announcement
        .cmp(&left.is_announcement)
        .then_with(|| match (left.last_message_at, right.last_message_at) {
            (Some(left_at), Some(right_at)) => right_at.cmp(&left_at),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| sort_key(left).cmp(sort_key(right)))
}

fn sort_key(channel: &Channel) -> &str {
    channel.name.as_deref().unwrap_or(channel.id.as_str())
}

/// Messages from others that the viewer has not seen. Rows without a sender
/// count as unseen.
pub fn unread_count(messages: &[Message], viewer_id: &str) -> u32 {
    let count = messages
        .iter()
        .filter(|message| !message.is_pending())
        .filter(|message| message.sender_id != viewer_id)
        .filter(|message| !message.is_seen_by(viewer_id))
        .count();

    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        channel::fixtures::{direct, group},
        message::fixtures::message,
    };

    fn ids(directory: &ChannelDirectory) -> Vec<&str> {
        directory
            .channels()
            .iter()
            .map(|channel| channel.id.as_str())
            .collect()
    }

    #[test]
    fn default_state_is_loading_without_selection() {
        let directory = ChannelDirectory::default();

        assert_eq!(directory.ui_state(), DirectoryUiState::Loading);
        assert!(directory.channels().is_empty());
        assert_eq!(directory.selected_id(), None);
    }

    #[test]
    fn empty_list_transitions_to_empty_state() {
        let mut directory = ChannelDirectory::default();

        directory.set_ready(vec![]);

        assert_eq!(directory.ui_state(), DirectoryUiState::Empty);
    }

    #[test]
    fn announcements_come_first_then_recent_activity() {
        let mut quiet = group("quiet", "Quiet", &["alice"]);
        quiet.touch_last_message(&message("1", "quiet", "bob", "old", 10));
        let mut busy = group("busy", "Busy", &["alice"]);
        busy.touch_last_message(&message("2", "busy", "bob", "new", 50));
        let mut news = group("news", "News", &["alice"]);
        news.is_announcement = true;
        let never = group("never", "Never", &["alice"]);

        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![never, quiet, busy, news]);

        assert_eq!(ids(&directory), vec!["news", "busy", "quiet", "never"]);
    }

    #[test]
    fn new_message_moves_channel_up() {
        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![group("a", "A", &[]), group("b", "B", &[])]);

        assert!(directory.record_message(&message("1", "b", "bob", "ping", 5)));
        assert!(!directory.record_message(&message("2", "zzz", "bob", "lost", 6)));

        assert_eq!(ids(&directory), vec!["b", "a"]);
        assert_eq!(
            directory.get("b").and_then(|c| c.last_message.as_ref()).map(|m| m.preview.as_str()),
            Some("ping")
        );
    }

    #[test]
    fn selection_survives_refresh_by_id() {
        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![group("a", "A", &[]), group("b", "B", &[])]);
        directory.select("b");

        directory.set_ready(vec![group("c", "C", &[]), group("b", "B", &[])]);
        assert_eq!(directory.selected_id(), Some("b"));

        directory.set_ready(vec![group("c", "C", &[])]);
        assert_eq!(directory.selected_id(), None);
    }

    #[test]
    fn selecting_unknown_channel_keeps_previous_selection() {
        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![group("a", "A", &[])]);
        directory.select("a");

        assert!(directory.select("missing").is_none());
        assert_eq!(directory.selected_id(), Some("a"));
    }

    #[test]
    fn search_matches_name_description_and_direct_counterpart() {
        let mut physics = group("p", "Physics", &["alice"]);
        physics.description = Some("Lab reports".to_owned());
        let chat = direct("d", "alice", "bob");
        let bob = User::new("bob", "Bob Marley");

        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![physics, chat, group("m", "Maths", &["alice"])]);

        directory.set_search_query("LAB");
        let found: Vec<_> = directory
            .filtered("alice", |id| (id == "bob").then_some(&bob))
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(found, vec!["p"]);

        directory.set_search_query("marley");
        let found: Vec<_> = directory
            .filtered("alice", |id| (id == "bob").then_some(&bob))
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(found, vec!["d"]);
    }

    #[test]
    fn unread_counts_unseen_messages_from_others() {
        let mut seen = message("1", "c", "bob", "seen", 0);
        seen.mark_seen("alice");
        let messages = vec![
            seen,
            message("2", "c", "bob", "unseen", 1),
            message("3", "c", "alice", "own", 2),
            message("4", "c", "", "malformed", 3),
            message("temp-5", "c", "bob", "pending", 4),
        ];

        assert_eq!(unread_count(&messages, "alice"), 2);
    }

    #[test]
    fn rollback_restores_previous_last_message() {
        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![group("a", "A", &[]), group("b", "B", &[])]);
        directory.record_message(&message("1", "a", "bob", "earlier", 5));
        let snapshot = directory.last_message_snapshot("b");
        directory.record_message(&message("temp-x", "b", "alice", "failed", 9));
        assert_eq!(ids(&directory), vec!["b", "a"]);

        directory.restore_last_message("b", &MessageId::new("temp-x"), snapshot);

        assert_eq!(ids(&directory), vec!["a", "b"]);
        assert!(directory.get("b").is_some_and(|c| c.last_message.is_none()));
    }

    #[test]
    fn unread_accounting_accumulates() {
        let mut directory = ChannelDirectory::default();
        directory.set_ready(vec![group("a", "A", &[]), group("b", "B", &[])]);

        directory.set_unread("a", 2);
        directory.increment_unread("b");

        assert_eq!(directory.total_unread(), 3);
    }
}
