use std::collections::{HashMap, HashSet};

use chrono::Duration;

use super::{
    channel::ChannelId,
    message::{Message, MessageId},
};

const DEFAULT_SUPERSEDE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The pending optimistic entry with this temp id was replaced in place by
    /// the confirmed row.
    Superseded(MessageId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Replaced,
    /// The temp entry was already gone; the confirmed row was merged by id.
    Merged,
    /// Neither the temp entry nor the confirmed row is cached.
    Missing,
}

/// Per-channel message sequences ordered by `created_at`, with stable insertion:
/// existing entries never move.
#[derive(Debug, Clone)]
pub struct MessageCache {
    channels: HashMap<ChannelId, Vec<Message>>,
    supersede_window: Duration,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::with_supersede_window(Duration::seconds(DEFAULT_SUPERSEDE_WINDOW_SECS))
    }
}

impl MessageCache {
    /// `window` bounds how much older than an optimistic message a server row
    /// may be and still count as its confirmation.
    pub fn with_supersede_window(window: Duration) -> Self {
        Self {
            channels: HashMap::new(),
            supersede_window: window,
        }
    }

    pub fn is_loaded(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }

    pub fn messages(&self, channel_id: &str) -> &[Message] {
        self.channels
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, channel_id: &str, message_id: &MessageId) -> Option<&Message> {
        self.messages(channel_id)
            .iter()
            .find(|message| message.id == *message_id)
    }

    pub fn find(&self, message_id: &MessageId) -> Option<&Message> {
        self.channels
            .values()
            .flat_map(|sequence| sequence.iter())
            .find(|message| message.id == *message_id)
    }

    pub fn find_mut(&mut self, message_id: &MessageId) -> Option<&mut Message> {
        self.channels
            .values_mut()
            .flat_map(|sequence| sequence.iter_mut())
            .find(|message| message.id == *message_id)
    }

    /// Replaces the channel's sequence. In-flight optimistic messages survive at
    /// the tail unless a loaded row already confirms them.
    pub fn load(&mut self, channel_id: &str, mut loaded: Vec<Message>) {
        let previous = self.channels.remove(channel_id).unwrap_or_default();
        let known_ids: HashSet<MessageId> = previous
            .iter()
            .filter(|message| !message.is_pending())
            .map(|message| message.id.clone())
            .collect();

        loaded.sort_by(|left, right| left.created_at.cmp(&right.created_at));

        let mut claimed = HashSet::new();
        let mut kept_pending = Vec::new();
        for pending in previous.into_iter().filter(Message::is_pending) {
            let confirmation = loaded.iter().position(|row| {
                !claimed.contains(&row.id)
                    && !known_ids.contains(&row.id)
                    && self.supersedes(row, &pending)
            });

            match confirmation {
                Some(index) => {
                    claimed.insert(loaded[index].id.clone());
                    tracing::debug!(
                        channel_id,
                        temp_id = %pending.id,
                        message_id = %loaded[index].id,
                        "loaded row confirms pending message"
                    );
                }
                None => kept_pending.push(pending),
            }
        }

        loaded.extend(kept_pending);
        self.channels.insert(channel_id.to_owned(), loaded);
    }

    /// Replaces by id in place, otherwise inserts after the last message not
    /// newer than the incoming one.
    pub fn upsert(&mut self, channel_id: &str, message: Message) -> UpsertOutcome {
        let sequence = self.channels.entry(channel_id.to_owned()).or_default();

        if let Some(existing) = sequence.iter_mut().find(|item| item.id == message.id) {
            existing.merge_server(message);
            return UpsertOutcome::Replaced;
        }

        let index = insertion_index(sequence, &message);
        sequence.insert(index, message);
        UpsertOutcome::Inserted
    }

    /// Upsert for confirmed rows arriving from the push stream: a matching
    /// pending entry (same channel, same sender, identical content) is replaced
    /// in place so the sender never sees their message twice.
    pub fn absorb_confirmed(&mut self, channel_id: &str, message: Message) -> UpsertOutcome {
        if self.get(channel_id, &message.id).is_some() {
            return self.upsert(channel_id, message);
        }

        let window = self.supersede_window;
        let pending_slot = self.channels.get_mut(channel_id).and_then(|sequence| {
            sequence
                .iter_mut()
                .find(|item| supersedes_within(window, &message, item))
        });

        match pending_slot {
            Some(slot) => {
                tracing::debug!(
                    channel_id,
                    temp_id = %slot.id,
                    message_id = %message.id,
                    "push insert supersedes pending message"
                );
                let temp_id = slot.id.clone();
                slot.merge_server(message);
                UpsertOutcome::Superseded(temp_id)
            }
            None => self.upsert(channel_id, message),
        }
    }

    /// Swaps the optimistic entry for the confirmed one without re-sorting.
    pub fn reconcile(
        &mut self,
        channel_id: &str,
        temp_id: &MessageId,
        confirmed: Message,
    ) -> ReconcileOutcome {
        let Some(sequence) = self.channels.get_mut(channel_id) else {
            return ReconcileOutcome::Missing;
        };

        let temp_index = sequence.iter().position(|item| item.id == *temp_id);
        let confirmed_index = sequence.iter().position(|item| item.id == confirmed.id);

        match (temp_index, confirmed_index) {
            (Some(temp_index), Some(confirmed_index)) => {
                let mut merged = sequence.remove(confirmed_index);
                merged.merge_server(confirmed);
                let slot = if confirmed_index < temp_index {
                    temp_index - 1
                } else {
                    temp_index
                };
                sequence[slot] = merged;
                ReconcileOutcome::Replaced
            }
            (Some(temp_index), None) => {
                sequence[temp_index].merge_server(confirmed);
                ReconcileOutcome::Replaced
            }
            (None, Some(confirmed_index)) => {
                sequence[confirmed_index].merge_server(confirmed);
                ReconcileOutcome::Merged
            }
            (None, None) => ReconcileOutcome::Missing,
        }
    }

    /// Removes a failed optimistic message. Confirmed messages are never evicted.
    pub fn evict(&mut self, channel_id: &str, temp_id: &MessageId) -> bool {
        if !temp_id.is_temporary() {
            return false;
        }

        let Some(sequence) = self.channels.get_mut(channel_id) else {
            return false;
        };

        let before = sequence.len();
        sequence.retain(|item| item.id != *temp_id);
        before != sequence.len()
    }

    /// Adds `user_id` to `seen_by` of every confirmed message visible to them.
    /// Returns the ids that were newly marked.
    pub fn mark_seen(&mut self, channel_id: &str, user_id: &str) -> Vec<MessageId> {
        let Some(sequence) = self.channels.get_mut(channel_id) else {
            return Vec::new();
        };

        sequence
            .iter_mut()
            .filter(|message| !message.is_pending() && message.is_visible_to(user_id))
            .filter_map(|message| message.mark_seen(user_id).then(|| message.id.clone()))
            .collect()
    }

    pub fn loaded_channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().cloned().collect()
    }

    pub fn unload(&mut self, channel_id: &str) {
        self.channels.remove(channel_id);
    }

    fn supersedes(&self, confirmed: &Message, pending: &Message) -> bool {
        supersedes_within(self.supersede_window, confirmed, pending)
    }
}

fn supersedes_within(window: Duration, confirmed: &Message, pending: &Message) -> bool {
    pending.is_pending()
        && pending.channel_id == confirmed.channel_id
        && pending.sender_id == confirmed.sender_id
        && pending.content == confirmed.content
        && confirmed.created_at >= pending.created_at - window
}

fn insertion_index(sequence: &[Message], message: &Message) -> usize {
    sequence
        .iter()
        .rposition(|item| item.created_at <= message.created_at)
        .map_or(0, |index| index + 1)
}
