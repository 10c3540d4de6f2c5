use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Mutex, MutexGuard,
    },
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::{runtime::Runtime, sync::broadcast};

use crate::{
    domain::{
        channel::Channel,
        channel_directory::unread_count,
        events::{PushEvent, PushTable},
        message::{Message, MessageId, NewMessage, Reactions},
        typing::TypingRow,
        user::{PresenceRow, Role, User, UserId},
    },
    infra::error::AppError,
    realtime::relay::PushRelay,
    usecases::contracts::{BackendError, ChatBackend, IdentitySource, PushSource, Subscription},
};

const MEMORY_PUSH_ENCODE_FAILED: &str = "MEMORY_PUSH_ENCODE_FAILED";

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    presence: BTreeMap<UserId, PresenceRow>,
    typing: BTreeMap<(String, UserId), TypingRow>,
    next_id: u64,
}

impl MemoryState {
    fn channel(&self, channel_id: &str) -> Result<&Channel, BackendError> {
        self.channels
            .iter()
            .find(|channel| channel.id == channel_id)
            .ok_or(BackendError::NotFound)
    }

    fn joined(&self, mut message: Message) -> Message {
        message.sender = self
            .users
            .iter()
            .find(|user| user.id == message.sender_id)
            .map(User::profile);
        message
    }

    fn user_channels(&self, user_id: &str) -> impl Iterator<Item = &Channel> {
        let user_id = user_id.to_owned();
        self.channels
            .iter()
            .filter(move |channel| channel.is_member(&user_id))
    }
}

/// In-process row store with change feeds. Every write publishes the
/// resulting row on the matching push table.
pub struct MemoryBackend {
    runtime: Runtime,
    identity: UserId,
    state: Mutex<MemoryState>,
    feed: broadcast::Sender<PushEvent>,
    fail_writes: AtomicBool,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new(identity: impl Into<UserId>, feed_capacity: usize) -> Result<Self, AppError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("commhub-push")
            .enable_all()
            .build()
            .map_err(AppError::RuntimeInit)?;
        let (feed, _) = broadcast::channel(feed_capacity.max(1));

        Ok(Self {
            runtime,
            identity: identity.into(),
            state: Mutex::new(MemoryState::default()),
            feed,
            fail_writes: AtomicBool::new(false),
        })
    }

    /// A small school: one teacher, one parent, one admin and the configured
    /// student, with an announcement board, a class group and a direct chat.
    pub fn demo(identity: impl Into<UserId>, feed_capacity: usize, now: DateTime<Utc>) -> Result<Self, AppError> {
        let backend = Self::new(identity, feed_capacity)?;
        let me = backend.identity.clone();

        let users = vec![
            User::new("alice", "Alice Moreau"),
            User::new("bob", "Mr. Bob Okafor").with_role(Role::Teacher),
            User::new("carol", "Carol Lindqvist").with_role(Role::Parent),
            User::new("dana", "Dana Ruiz").with_role(Role::Admin),
        ];
        let everyone: Vec<UserId> = users.iter().map(|user| user.id.clone()).collect();

        backend.seed_users(users);
        backend.seed_channel(Channel {
            id: "announcements".to_owned(),
            name: Some("School announcements".to_owned()),
            description: Some("Notices from the front office".to_owned()),
            is_group: true,
            is_announcement: true,
            participants: everyone,
            last_message_at: None,
            last_message: None,
            unread_count: 0,
        });
        backend.seed_channel(Channel {
            id: "physics-10b".to_owned(),
            name: Some("Physics 10B".to_owned()),
            description: None,
            is_group: true,
            is_announcement: false,
            participants: vec!["alice".to_owned(), "bob".to_owned(), "carol".to_owned()],
            last_message_at: None,
            last_message: None,
            unread_count: 0,
        });
        backend.seed_channel(Channel {
            id: "dm-alice-bob".to_owned(),
            name: None,
            description: None,
            is_group: false,
            is_announcement: false,
            participants: vec!["alice".to_owned(), "bob".to_owned()],
            last_message_at: None,
            last_message: None,
            unread_count: 0,
        });

        let start = now - Duration::hours(3);
        backend.seed_message("announcements", "dana", "Parent evening moves to Thursday 18:00.", start);
        backend.seed_message(
            "physics-10b",
            "bob",
            "Lab report on pendulums is due Friday.",
            start + Duration::minutes(30),
        );
        backend.seed_message(
            "physics-10b",
            "carol",
            "Is the report handwritten or typed?",
            start + Duration::minutes(41),
        );
        backend.seed_message(
            "dm-alice-bob",
            "bob",
            "Alice, can you stay five minutes after class?",
            start + Duration::minutes(95),
        );
        backend.seed_presence("bob", true, now);
        backend.seed_presence("carol", false, now - Duration::minutes(20));
        tracing::debug!(identity = %me, "demo backend seeded");

        Ok(backend)
    }

    pub fn seed_users(&self, users: Vec<User>) {
        if let Ok(mut state) = self.state.lock() {
            state.users.extend(users);
        }
    }

    pub fn seed_channel(&self, channel: Channel) {
        if let Ok(mut state) = self.state.lock() {
            state.channels.push(channel);
        }
    }

    /// Adds history without publishing. The sender has seen their own message.
    pub fn seed_message(&self, channel_id: &str, sender_id: &str, content: &str, created_at: DateTime<Utc>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let message = new_row(&mut state, &NewMessage {
            channel_id: channel_id.to_owned(),
            sender_id: sender_id.to_owned(),
            content: content.to_owned(),
            message_type: Default::default(),
            reply_to: None,
            forwarded_from: None,
        }, created_at);
        touch_channel(&mut state, &message);
        state.messages.push(message);
    }

    pub fn seed_presence(&self, user_id: &str, is_online: bool, last_seen: DateTime<Utc>) {
        if let Ok(mut state) = self.state.lock() {
            state.presence.insert(
                user_id.to_owned(),
                PresenceRow {
                    user_id: user_id.to_owned(),
                    is_online,
                    last_seen,
                },
            );
        }
    }

    /// Makes every later write fail with `Unavailable`.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Writes a message as another participant, as if from a second client.
    #[cfg(test)]
    pub fn post_as(
        &self,
        sender_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<Message, BackendError> {
        self.insert_message(&NewMessage {
            channel_id: channel_id.to_owned(),
            sender_id: sender_id.to_owned(),
            content: content.to_owned(),
            message_type: Default::default(),
            reply_to: None,
            forwarded_from: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        self.state.lock().map_err(|_| BackendError::Unavailable)
    }

    fn check_write(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable);
        }
        Ok(())
    }

    fn modify(
        &self,
        message_id: &MessageId,
        change: impl FnOnce(&mut Message),
    ) -> Result<Message, BackendError> {
        self.check_write()?;
        let updated = {
            let mut state = self.lock()?;
            let row = state
                .messages
                .iter_mut()
                .find(|row| row.id == *message_id)
                .ok_or(BackendError::NotFound)?;
            change(row);
            row.updated_at = row.updated_at.max(Utc::now());
            let row = row.clone();
            state.joined(row)
        };

        self.publish(PushEvent::update(PushTable::Messages, &updated));
        Ok(updated)
    }

    fn publish(&self, event: Result<PushEvent, serde_json::Error>) {
        match event {
            // No receivers just means nobody is subscribed right now.
            Ok(event) => {
                let _ = self.feed.send(event);
            }
            Err(error) => tracing::warn!(
                code = MEMORY_PUSH_ENCODE_FAILED,
                error = %error,
                "push row could not be encoded"
            ),
        }
    }

    fn publish_row<T: Serialize>(&self, table: PushTable, row: &T) {
        self.publish(PushEvent::update(table, row));
    }
}

fn new_row(state: &mut MemoryState, payload: &NewMessage, created_at: DateTime<Utc>) -> Message {
    state.next_id += 1;
    Message {
        id: MessageId::new(format!("m{}", state.next_id)),
        channel_id: payload.channel_id.clone(),
        sender_id: payload.sender_id.clone(),
        sender: None,
        content: payload.content.clone(),
        message_type: payload.message_type,
        created_at,
        updated_at: created_at,
        edited: false,
        edited_at: None,
        deleted_for_everyone: false,
        deleted_for_sender: false,
        reply_to: payload.reply_to.clone(),
        forwarded_from: payload.forwarded_from.clone(),
        reactions: Reactions::default(),
        seen_by: [payload.sender_id.clone()].into_iter().collect(),
    }
}

fn touch_channel(state: &mut MemoryState, message: &Message) {
    if let Some(channel) = state
        .channels
        .iter_mut()
        .find(|channel| channel.id == message.channel_id)
    {
        channel.touch_last_message(message);
    }
}

impl ChatBackend for MemoryBackend {
    fn list_channels(&self, user_id: &str) -> Result<Vec<Channel>, BackendError> {
        let state = self.lock()?;
        let mut channels: Vec<Channel> = state
            .user_channels(user_id)
            .map(|channel| {
                let history: Vec<Message> = state
                    .messages
                    .iter()
                    .filter(|message| message.channel_id == channel.id)
                    .cloned()
                    .collect();
                Channel {
                    unread_count: unread_count(&history, user_id),
                    ..channel.clone()
                }
            })
            .collect();
        channels.sort_by(|left, right| right.last_message_at.cmp(&left.last_message_at));
        Ok(channels)
    }

    fn list_users(&self) -> Result<Vec<User>, BackendError> {
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .map(|user| {
                let presence = state.presence.get(&user.id);
                User {
                    is_online: presence.is_some_and(|row| row.is_online),
                    last_seen: presence.map(|row| row.last_seen),
                    ..user.clone()
                }
            })
            .collect())
    }

    fn list_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>, BackendError> {
        let state = self.lock()?;
        state.channel(channel_id)?;
        let history: Vec<&Message> = state
            .messages
            .iter()
            .filter(|message| message.channel_id == channel_id)
            .collect();
        let skip = history.len().saturating_sub(limit);
        Ok(history
            .into_iter()
            .skip(skip)
            .map(|message| state.joined(message.clone()))
            .collect())
    }

    fn fetch_message(&self, message_id: &MessageId) -> Result<Message, BackendError> {
        let state = self.lock()?;
        state
            .messages
            .iter()
            .find(|message| message.id == *message_id)
            .map(|message| state.joined(message.clone()))
            .ok_or(BackendError::NotFound)
    }

    fn insert_message(&self, payload: &NewMessage) -> Result<Message, BackendError> {
        self.check_write()?;
        let inserted = {
            let mut state = self.lock()?;
            let channel = state.channel(&payload.channel_id)?;
            if !channel.is_member(&payload.sender_id) {
                return Err(BackendError::Unauthorized);
            }
            let row = new_row(&mut state, payload, Utc::now());
            touch_channel(&mut state, &row);
            state.messages.push(row.clone());
            state.joined(row)
        };

        self.publish(PushEvent::insert(PushTable::Messages, &inserted));
        Ok(inserted)
    }

    fn update_message_content(
        &self,
        message_id: &MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, BackendError> {
        self.modify(message_id, |row| {
            row.content = content.to_owned();
            row.edited = true;
            row.edited_at = Some(edited_at);
            row.updated_at = edited_at;
        })
    }

    fn mark_deleted(&self, message_id: &MessageId, for_everyone: bool) -> Result<Message, BackendError> {
        self.modify(message_id, |row| {
            if for_everyone {
                row.deleted_for_everyone = true;
            } else {
                row.deleted_for_sender = true;
            }
        })
    }

    fn replace_reactions(
        &self,
        message_id: &MessageId,
        reactions: &Reactions,
    ) -> Result<Message, BackendError> {
        self.modify(message_id, |row| row.reactions = reactions.clone())
    }

    fn add_seen_by(&self, message_ids: &[MessageId], user_id: &str) -> Result<(), BackendError> {
        self.check_write()?;
        let changed: Vec<Message> = {
            let mut state = self.lock()?;
            let mut changed = Vec::new();
            for row in state
                .messages
                .iter_mut()
                .filter(|row| message_ids.contains(&row.id))
            {
                if row.mark_seen(user_id) {
                    changed.push(row.clone());
                }
            }
            changed.into_iter().map(|row| state.joined(row)).collect()
        };

        for row in &changed {
            self.publish_row(PushTable::Messages, row);
        }
        Ok(())
    }

    fn upsert_presence(&self, row: &PresenceRow) -> Result<(), BackendError> {
        self.check_write()?;
        let existed = self
            .lock()?
            .presence
            .insert(row.user_id.clone(), row.clone())
            .is_some();

        if existed {
            self.publish_row(PushTable::Presence, row);
        } else {
            self.publish(PushEvent::insert(PushTable::Presence, row));
        }
        Ok(())
    }

    fn upsert_typing(&self, row: &TypingRow) -> Result<(), BackendError> {
        self.check_write()?;
        self.lock()?
            .typing
            .insert((row.channel_id.clone(), row.user_id.clone()), row.clone());
        self.publish_row(PushTable::Typing, row);
        Ok(())
    }

    fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError> {
        let state = self.lock()?;
        let needle = query.to_lowercase();
        let member_of: Vec<&str> = state
            .user_channels(user_id)
            .map(|channel| channel.id.as_str())
            .collect();

        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|message| member_of.contains(&message.channel_id.as_str()))
            .filter(|message| !message.deleted_for_everyone)
            .filter(|message| message.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|message| state.joined(message.clone()))
            .collect())
    }
}

impl PushSource for MemoryBackend {
    fn subscribe(
        &self,
        table: PushTable,
        sink: Sender<PushEvent>,
    ) -> Result<Box<dyn Subscription>, BackendError> {
        Ok(Box::new(PushRelay::start(
            self.runtime.handle(),
            table,
            self.feed.subscribe(),
            sink,
        )))
    }
}

impl IdentitySource for MemoryBackend {
    fn current_user(&self) -> Result<Option<User>, BackendError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| user.id == self.identity).cloned())
    }
}
