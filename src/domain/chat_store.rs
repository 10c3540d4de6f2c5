//! Client-side messaging state: channels, message histories, presence and
//! typing, plus the staged UI intents (reply, edit, forward, selection).
//!
//! Every mutation is a short synchronous step. Durable writes happen outside
//! the store: operations are split into a `begin`/`prepare` phase that
//! validates (and, for sends, applies the optimistic entry) and a
//! `commit`/`apply` phase that takes the write outcome.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use super::{
    channel::{Channel, ChannelId},
    channel_directory::{unread_count, ChannelDirectory, LastMessageSnapshot},
    errors::ChatError,
    message::{Message, MessageId, MessageType, NewMessage, Reactions},
    message_cache::{MessageCache, ReconcileOutcome, UpsertOutcome},
    presence::PresenceTracker,
    typing::{typing_indicator, TypingRow, TypingSignal, TypingTracker},
    user::{PresenceRow, User},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub typing_idle_window: Duration,
    pub typing_stale_after: Duration,
    pub supersede_window: Duration,
    /// Page size used when a channel history is (re)loaded.
    pub history_limit: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            typing_idle_window: Duration::seconds(2),
            typing_stale_after: Duration::seconds(5),
            supersede_window: Duration::seconds(60),
            history_limit: 50,
        }
    }
}

/// What the user asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDraft {
    pub channel_id: Option<ChannelId>,
    pub content: String,
    pub message_type: MessageType,
    pub forwarded_from: Option<MessageId>,
}

impl SendDraft {
    pub fn text(channel_id: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.map(str::to_owned),
            content: content.into(),
            message_type: MessageType::Text,
            forwarded_from: None,
        }
    }

    pub fn forward(channel_id: &str, original: &Message) -> Self {
        Self {
            channel_id: Some(channel_id.to_owned()),
            content: original.content.clone(),
            message_type: MessageType::Forwarded,
            forwarded_from: Some(original.id.clone()),
        }
    }
}

/// Speculative half of a send: the optimistic entry is already cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    temp_id: MessageId,
    payload: NewMessage,
    previous_last: LastMessageSnapshot,
}

impl PendingSend {
    pub fn temp_id(&self) -> &MessageId {
        &self.temp_id
    }

    pub fn channel_id(&self) -> &str {
        &self.payload.channel_id
    }

    pub fn payload(&self) -> &NewMessage {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub message_id: MessageId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    ForSender,
    ForEveryone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub message_id: MessageId,
    pub scope: DeleteScope,
}

/// Full replacement mapping for one reaction toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRequest {
    pub message_id: MessageId,
    pub reactions: Reactions,
}

#[derive(Debug, Clone)]
pub struct ChatStore {
    current_user: Option<User>,
    cache: MessageCache,
    directory: ChannelDirectory,
    presence: PresenceTracker,
    typing: TypingTracker,
    typing_outbox: Vec<TypingSignal>,
    replying_to: Option<MessageId>,
    selected_messages: BTreeSet<MessageId>,
    error: Option<String>,
    settings: StoreSettings,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}

impl ChatStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            current_user: None,
            cache: MessageCache::with_supersede_window(settings.supersede_window),
            directory: ChannelDirectory::default(),
            presence: PresenceTracker::default(),
            typing: TypingTracker::new(settings.typing_idle_window, settings.typing_stale_after),
            typing_outbox: Vec::new(),
            replying_to: None,
            selected_messages: BTreeSet::new(),
            error: None,
            settings,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.settings.history_limit
    }

    // ---- session -------------------------------------------------------

    /// Switching to a different identity (or none) discards all cached state.
    pub fn set_current_user(&mut self, user: Option<User>) {
        let same_identity = match (&self.current_user, &user) {
            (Some(current), Some(next)) => current.id == next.id,
            _ => false,
        };

        if !same_identity {
            let settings = self.settings;
            *self = Self::new(settings);
        }

        if let Some(user) = &user {
            self.presence.remember(user.clone());
        }
        self.current_user = user;
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn current_user_id(&self) -> Result<&str, ChatError> {
        self.current_user
            .as_ref()
            .map(|user| user.id.as_str())
            .ok_or(ChatError::NotAuthenticated)
    }

    // ---- read access ---------------------------------------------------

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn selected_channel_id(&self) -> Option<&str> {
        self.directory.selected_id()
    }

    /// Messages of a channel as the current user should see them.
    pub fn visible_messages(&self, channel_id: &str) -> Vec<&Message> {
        let viewer = self.current_user_id().unwrap_or_default();
        self.cache
            .messages(channel_id)
            .iter()
            .filter(|message| message.is_visible_to(viewer))
            .collect()
    }

    /// Resolves `reply_to` a single hop.
    pub fn reply_preview(&self, message: &Message) -> Option<&Message> {
        message
            .reply_to
            .as_ref()
            .and_then(|reply_to| self.cache.get(&message.channel_id, reply_to))
    }

    pub fn channel_name(&self, channel: &Channel) -> String {
        let viewer = self.current_user_id().unwrap_or_default();
        channel.display_name(viewer, |user_id| self.presence.user(user_id))
    }

    /// Narrows `filtered_channels` to names and descriptions matching `query`.
    pub fn set_channel_filter(&mut self, query: &str) {
        self.directory.set_search_query(query.trim());
    }

    pub fn filtered_channels(&self) -> Vec<&Channel> {
        let viewer = self.current_user_id().unwrap_or_default();
        self.directory
            .filtered(viewer, |user_id| self.presence.user(user_id))
    }

    pub fn typing_indicator(&self, channel_id: &str) -> Option<String> {
        let viewer = self.current_user_id().unwrap_or_default();
        let names: Vec<String> = self
            .typing
            .typing_users(channel_id, viewer)
            .into_iter()
            .map(|user_id| {
                self.presence
                    .user(user_id)
                    .map(|user| user.display_name.clone())
                    .unwrap_or_else(|| user_id.clone())
            })
            .collect();
        typing_indicator(&names)
    }

    // ---- error ---------------------------------------------------------

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replaces any previous error.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---- staged intents ------------------------------------------------

    pub fn set_replying_to(&mut self, message_id: Option<MessageId>) {
        self.replying_to = message_id;
    }

    pub fn replying_to(&self) -> Option<&Message> {
        self.replying_to
            .as_ref()
            .and_then(|message_id| self.cache.find(message_id))
    }

    pub fn toggle_message_selection(&mut self, message_id: MessageId) {
        if !self.selected_messages.remove(&message_id) {
            self.selected_messages.insert(message_id);
        }
    }

    pub fn selected_messages(&self) -> &BTreeSet<MessageId> {
        &self.selected_messages
    }

    /// Selected messages of `channel_id` in history order.
    pub fn selected_in_channel(&self, channel_id: &str) -> Vec<MessageId> {
        self.cache
            .messages(channel_id)
            .iter()
            .filter(|message| self.selected_messages.contains(&message.id))
            .map(|message| message.id.clone())
            .collect()
    }

    pub fn clear_selected_messages(&mut self) {
        self.selected_messages.clear();
    }

    // ---- channels ------------------------------------------------------

    pub fn set_channels_loading(&mut self) {
        self.directory.set_loading();
    }

    pub fn set_channels_failed(&mut self, error: &ChatError) {
        self.directory.set_error();
        self.set_error(format!("Failed to load channels: {error}"));
    }

    /// Histories of channels missing from the refreshed list are dropped.
    pub fn set_channels(&mut self, channels: Vec<Channel>) {
        for channel_id in self.cache.loaded_channel_ids() {
            if !channels.iter().any(|channel| channel.id == channel_id) {
                self.cache.unload(&channel_id);
            }
        }

        let loaded: Vec<ChannelId> = channels
            .iter()
            .filter(|channel| self.cache.is_loaded(&channel.id))
            .map(|channel| channel.id.clone())
            .collect();

        self.directory.set_ready(channels);
        for channel_id in loaded {
            self.refresh_unread(&channel_id);
        }
    }

    pub fn set_users(&mut self, users: Vec<User>) {
        let current = self.current_user.clone();
        self.presence.set_users(users);
        if let Some(user) = current {
            self.presence.remember(user);
        }
    }

    pub fn select_channel(&mut self, channel_id: &str) -> Result<(), ChatError> {
        if self.directory.select(channel_id).is_none() {
            return Err(ChatError::ChannelNotFound(channel_id.to_owned()));
        }

        if self
            .replying_to()
            .is_some_and(|message| message.channel_id != channel_id)
        {
            self.replying_to = None;
        }
        self.selected_messages.clear();
        Ok(())
    }

    pub fn load_messages(&mut self, channel_id: &str, messages: Vec<Message>) {
        for sender in messages.iter().filter_map(|message| message.sender.as_ref()) {
            if self.presence.user(&sender.id).is_none() {
                self.presence.remember(profile_user(sender));
            }
        }

        self.cache.load(channel_id, messages);
        if let Some(last) = self.cache.messages(channel_id).last().cloned() {
            self.directory.record_message(&last);
        }
        self.refresh_unread(channel_id);
    }

    /// Marks every visible message of the channel as seen by the current user.
    /// Returns the ids to persist; seen status is never revoked.
    pub fn mark_channel_seen(&mut self, channel_id: &str) -> Vec<MessageId> {
        let Ok(viewer) = self.current_user_id().map(str::to_owned) else {
            return Vec::new();
        };

        let marked = self.cache.mark_seen(channel_id, &viewer);
        self.refresh_unread(channel_id);
        marked
    }

    fn refresh_unread(&mut self, channel_id: &str) {
        let viewer = self.current_user_id().unwrap_or_default();
        let count = unread_count(self.cache.messages(channel_id), viewer);
        self.directory.set_unread(channel_id, count);
    }

    // ---- send / reconcile ----------------------------------------------

    /// Validates the draft and inserts the optimistic message into the
    /// channel's history when that history is loaded. The staged reply target
    /// is attached (when it belongs to the same channel) and cleared.
    pub fn begin_send(
        &mut self,
        draft: SendDraft,
        now: DateTime<Utc>,
    ) -> Result<PendingSend, ChatError> {
        let user = self
            .current_user
            .clone()
            .ok_or(ChatError::NotAuthenticated)?;
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        let channel_id = draft
            .channel_id
            .filter(|channel_id| !channel_id.is_empty())
            .ok_or(ChatError::NoChannelSelected)?;

        let reply_to = if draft.message_type == MessageType::Forwarded {
            None
        } else {
            self.replying_to
                .take()
                .filter(|reply_to| self.cache.get(&channel_id, reply_to).is_some())
        };

        let temp_id = MessageId::temporary();
        let optimistic = Message {
            id: temp_id.clone(),
            channel_id: channel_id.clone(),
            sender_id: user.id.clone(),
            sender: Some(user.profile()),
            content: content.to_owned(),
            message_type: draft.message_type,
            created_at: now,
            updated_at: now,
            edited: false,
            edited_at: None,
            deleted_for_everyone: false,
            deleted_for_sender: false,
            reply_to,
            forwarded_from: draft.forwarded_from,
            reactions: Reactions::default(),
            seen_by: BTreeSet::from([user.id.clone()]),
        };

        let payload = NewMessage::from_optimistic(&optimistic);
        let previous_last = self.directory.last_message_snapshot(&channel_id);
        self.directory.record_message(&optimistic);
        if self.cache.is_loaded(&channel_id) {
            self.cache.upsert(&channel_id, optimistic);
        }

        tracing::debug!(channel_id = %channel_id, temp_id = %temp_id, "optimistic message inserted");

        Ok(PendingSend {
            temp_id,
            payload,
            previous_last,
        })
    }

    /// Confirmed half of a send: reconcile on success, evict and report on
    /// failure. Either way the sender is no longer typing in that channel.
    pub fn commit_send(
        &mut self,
        pending: PendingSend,
        outcome: Result<Message, ChatError>,
    ) -> Result<MessageId, ChatError> {
        let channel_id = pending.payload.channel_id.clone();
        if let Some(signal) = self.typing.stop_local(&channel_id) {
            self.typing_outbox.push(signal);
        }

        match outcome {
            Ok(confirmed) => {
                let message_id = confirmed.id.clone();
                self.directory.replace_last_message(&pending.temp_id, &confirmed);
                let reconciled = self.cache.reconcile(&channel_id, &pending.temp_id, confirmed);
                if reconciled == ReconcileOutcome::Missing {
                    tracing::debug!(
                        channel_id = %channel_id,
                        temp_id = %pending.temp_id,
                        "confirmed message has no cached counterpart"
                    );
                }
                Ok(message_id)
            }
            Err(error) => {
                self.cache.evict(&channel_id, &pending.temp_id);
                self.directory
                    .restore_last_message(&channel_id, &pending.temp_id, pending.previous_last);
                self.set_error(format!("Failed to send message: {error}"));
                Err(error)
            }
        }
    }

    // ---- edit / delete / react -----------------------------------------

    pub fn prepare_edit(
        &self,
        message_id: &MessageId,
        content: &str,
    ) -> Result<EditRequest, ChatError> {
        let viewer = self.current_user_id()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }

        let message = self.confirmed_message(message_id)?;
        if !message.is_own(viewer) {
            return Err(ChatError::NotMessageSender);
        }

        Ok(EditRequest {
            message_id: message_id.clone(),
            content: content.to_owned(),
        })
    }

    /// Edits have no optimistic phase; only a confirmed row changes the cache.
    /// The edit mark is kept even when the returned row omits it.
    pub fn apply_edit(
        &mut self,
        outcome: Result<Message, ChatError>,
        edited_at: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        match outcome {
            Ok(updated) => {
                let message_id = updated.id.clone();
                let edited_at = updated.edited_at.unwrap_or(edited_at);
                self.apply_confirmed_update(updated);
                if let Some(message) = self.cache.find_mut(&message_id) {
                    message.edited = true;
                    message.edited_at = Some(edited_at);
                }
                Ok(())
            }
            Err(error) => {
                self.set_error(format!("Failed to edit message: {error}"));
                Err(error)
            }
        }
    }

    /// `None` means the message already carries the requested deletion.
    pub fn prepare_delete(
        &self,
        message_id: &MessageId,
        scope: DeleteScope,
    ) -> Result<Option<DeleteRequest>, ChatError> {
        let user = self
            .current_user
            .as_ref()
            .ok_or(ChatError::NotAuthenticated)?;
        let message = self.confirmed_message(message_id)?;

        let already_deleted = match scope {
            DeleteScope::ForEveryone => message.deleted_for_everyone,
            DeleteScope::ForSender => message.deleted_for_sender,
        };
        if already_deleted {
            return Ok(None);
        }

        let permitted = match scope {
            DeleteScope::ForSender => message.is_own(&user.id),
            DeleteScope::ForEveryone => message.is_own(&user.id) || user.role.is_admin(),
        };
        if !permitted {
            return Err(ChatError::NotMessageSender);
        }

        Ok(Some(DeleteRequest {
            message_id: message_id.clone(),
            scope,
        }))
    }

    pub fn apply_delete(
        &mut self,
        request: &DeleteRequest,
        outcome: Result<Message, ChatError>,
    ) -> Result<(), ChatError> {
        match outcome {
            Ok(updated) => {
                self.apply_confirmed_update(updated);
                if let Some(message) = self.cache.find_mut(&request.message_id) {
                    match request.scope {
                        DeleteScope::ForEveryone => message.deleted_for_everyone = true,
                        DeleteScope::ForSender => message.deleted_for_sender = true,
                    }
                }
                self.selected_messages.remove(&request.message_id);
                Ok(())
            }
            Err(error) => {
                self.set_error(format!("Failed to delete message: {error}"));
                Err(error)
            }
        }
    }

    /// Computes the whole replacement mapping from the latest cached state.
    pub fn prepare_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<ReactionRequest, ChatError> {
        let viewer = self.current_user_id()?;
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ChatError::EmptyReaction);
        }

        let mut reactions = self.confirmed_message(message_id)?.reactions.clone();
        reactions.toggle(emoji, viewer);

        Ok(ReactionRequest {
            message_id: message_id.clone(),
            reactions,
        })
    }

    pub fn apply_reaction(&mut self, outcome: Result<Message, ChatError>) -> Result<(), ChatError> {
        match outcome {
            Ok(updated) => {
                self.apply_confirmed_update(updated);
                Ok(())
            }
            Err(error) => {
                self.set_error(format!("Failed to update reaction: {error}"));
                Err(error)
            }
        }
    }

    /// Cached copy of a forward source, if any.
    pub fn forward_source(&self, message_id: &MessageId) -> Option<&Message> {
        self.cache.find(message_id)
    }

    fn confirmed_message(&self, message_id: &MessageId) -> Result<&Message, ChatError> {
        if message_id.is_temporary() {
            return Err(ChatError::MessagePending(message_id.clone()));
        }

        self.cache
            .find(message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))
    }

    // ---- push application ----------------------------------------------

    /// Confirmed insert from the push stream. Channels without a loaded
    /// history only get their directory metadata updated.
    pub fn apply_confirmed_insert(&mut self, message: Message) -> Option<UpsertOutcome> {
        if let Some(sender) = &message.sender {
            if self.presence.user(&sender.id).is_none() {
                self.presence.remember(profile_user(sender));
            }
        }

        let channel_id = message.channel_id.clone();
        self.directory.record_message(&message);

        if !self.cache.is_loaded(&channel_id) {
            let viewer = self.current_user_id().unwrap_or_default();
            if !message.is_own(viewer) && !message.is_seen_by(viewer) {
                self.directory.increment_unread(&channel_id);
            }
            return None;
        }

        let message_id = message.id.clone();
        let outcome = self.cache.absorb_confirmed(&channel_id, message);
        if let UpsertOutcome::Superseded(temp_id) = &outcome {
            if let Some(confirmed) = self.cache.get(&channel_id, &message_id) {
                self.directory.replace_last_message(temp_id, confirmed);
            }
        }
        self.refresh_unread(&channel_id);
        Some(outcome)
    }

    /// Update by id, server fields over local ones. Unknown messages are ignored.
    pub fn apply_confirmed_update(&mut self, message: Message) -> bool {
        let channel_id = message.channel_id.clone();
        if self.cache.get(&channel_id, &message.id).is_none() {
            return false;
        }

        self.cache.upsert(&channel_id, message);
        self.refresh_unread(&channel_id);
        true
    }

    /// Physical deletes never evict; the message becomes a tombstone.
    pub fn apply_remote_delete(&mut self, message_id: &MessageId) -> bool {
        match self.cache.find_mut(message_id) {
            Some(message) => {
                message.deleted_for_everyone = true;
                true
            }
            None => false,
        }
    }

    pub fn apply_presence(&mut self, row: &PresenceRow) {
        self.presence.apply(row);
    }

    pub fn apply_typing(&mut self, row: &TypingRow, now: DateTime<Utc>) {
        self.typing.apply(row, now);
    }

    pub fn remove_typing(&mut self, channel_id: &str, user_id: &str) {
        self.typing.remove(channel_id, user_id);
    }

    // ---- local typing --------------------------------------------------

    /// Keystroke in the composer of a channel.
    pub fn note_input(&mut self, channel_id: &str, now: DateTime<Utc>) {
        if let Some(signal) = self.typing.on_input(channel_id, now) {
            self.typing_outbox.push(signal);
        }
    }

    /// Expires stale remote typing entries and trailing-edge clears local typing.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.typing.expire(now);
        let idle = self.typing.poll_idle(now);
        self.typing_outbox.extend(idle);
    }

    pub fn take_typing_signals(&mut self) -> Vec<TypingSignal> {
        std::mem::take(&mut self.typing_outbox)
    }

    /// Logout/teardown: everything ephemeral goes.
    pub fn reset(&mut self) {
        let settings = self.settings;
        *self = Self::new(settings);
    }
}

fn profile_user(profile: &super::user::UserProfile) -> User {
    User {
        id: profile.id.clone(),
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        role: profile.role,
        is_online: false,
        last_seen: None,
    }
}
