use anyhow::Result;

use crate::{
    domain::{
        channel::ChannelId,
        chat_store::{ChatStore, DeleteScope, SendDraft},
        errors::ChatError,
        events::{AppEvent, ShellCommand},
        message::MessageId,
        shell_state::{Panel, ShellState},
    },
    realtime::{
        event_mapping::{apply_push_event, PushEffect},
        subscription_manager::SubscriptionManager,
    },
};

use super::{
    contracts::{ChatBackend, Clock, IdentitySource, PushSource, ShellOrchestrator},
    delete_message::delete_message,
    edit_message::edit_message,
    list_channels::refresh_channels,
    presence::flush_typing,
    react_to_message::toggle_reaction,
    search_messages::search_messages,
    select_channel::{mark_channel_seen, open_channel},
    send_message::{forward_message, send_message},
    session::{end_session, start_session},
};

const SHELL_COMMAND_REJECTED: &str = "SHELL_COMMAND_REJECTED";

/// Drives the chat store from console events: commands run the matching
/// workflow, ticks apply pushed changes and age typing state.
pub struct DefaultShellOrchestrator<B, C>
where
    B: ChatBackend + PushSource + IdentitySource,
    C: Clock,
{
    state: ShellState,
    store: ChatStore,
    backend: B,
    clock: C,
    subscriptions: SubscriptionManager,
    realtime: bool,
}

impl<B, C> DefaultShellOrchestrator<B, C>
where
    B: ChatBackend + PushSource + IdentitySource,
    C: Clock,
{
    pub fn new(store: ChatStore, backend: B, clock: C, realtime: bool) -> Self {
        Self {
            state: ShellState::default(),
            store,
            backend,
            clock,
            subscriptions: SubscriptionManager::default(),
            realtime,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Signs in as the backend's current identity and opens the session.
    pub fn start(&mut self) -> Result<(), ChatError> {
        let push: Option<&dyn PushSource> = if self.realtime {
            Some(&self.backend)
        } else {
            None
        };

        start_session(
            &mut self.store,
            &self.backend,
            &self.backend,
            push,
            &mut self.subscriptions,
            self.clock.now(),
        )
    }

    /// Applies queued push events. The open channel is marked read as new
    /// messages land in it.
    fn pump_push(&mut self) -> usize {
        let events = self.subscriptions.drain();
        let applied = events.len();
        let now = self.clock.now();

        for event in events {
            match apply_push_event(&mut self.store, event, now) {
                PushEffect::Ignored => {}
                PushEffect::Message { channel_id } => {
                    if self.store.selected_channel_id() == Some(channel_id.as_str()) {
                        mark_channel_seen(&mut self.store, &self.backend, &channel_id);
                    }
                    self.state.request_redraw();
                }
                PushEffect::Presence { .. } | PushEffect::Typing { .. } => {
                    self.state.request_redraw();
                }
            }
        }

        applied
    }

    fn on_tick(&mut self) {
        self.pump_push();

        let now = self.clock.now();
        let indicator_before = self.open_typing_indicator();
        self.store.tick(now);
        flush_typing(&mut self.store, &self.backend, now);
        if self.open_typing_indicator() != indicator_before {
            self.state.request_redraw();
        }
    }

    fn open_typing_indicator(&self) -> Option<String> {
        self.store
            .selected_channel_id()
            .and_then(|channel_id| self.store.typing_indicator(channel_id))
    }

    fn run_command(&mut self, command: ShellCommand) {
        let now = self.clock.now();
        let result = match command {
            ShellCommand::Send(text) => {
                let draft = SendDraft::text(self.store.selected_channel_id(), text);
                send_message(&mut self.store, &self.backend, draft, now).map(|_| ())
            }
            ShellCommand::Typing => match self.store.selected_channel_id().map(str::to_owned) {
                Some(channel_id) => {
                    self.store.note_input(&channel_id, now);
                    flush_typing(&mut self.store, &self.backend, now);
                    Ok(())
                }
                None => Err(ChatError::NoChannelSelected),
            },
            ShellCommand::ListChannels => {
                self.store.set_channel_filter("");
                self.state.set_panel(Panel::Channels);
                refresh_channels(&mut self.store, &self.backend).map(|_| ())
            }
            ShellCommand::Filter(query) => {
                self.store.set_channel_filter(&query);
                self.state.set_panel(Panel::Channels);
                Ok(())
            }
            ShellCommand::Open(target) => self.open(&target),
            ShellCommand::Reply(position) => self.message_at(position).map(|message_id| {
                self.store.set_replying_to(Some(message_id));
            }),
            ShellCommand::CancelReply => {
                self.store.set_replying_to(None);
                self.store.clear_selected_messages();
                Ok(())
            }
            ShellCommand::Edit { position, content } => self.message_at(position).and_then(|message_id| {
                edit_message(&mut self.store, &self.backend, &message_id, &content, now)
            }),
            ShellCommand::Delete {
                position,
                for_everyone,
            } => self.message_at(position).and_then(|message_id| {
                let scope = if for_everyone {
                    DeleteScope::ForEveryone
                } else {
                    DeleteScope::ForSender
                };
                delete_message(&mut self.store, &self.backend, &message_id, scope)
            }),
            ShellCommand::React { position, emoji } => self.message_at(position).and_then(|message_id| {
                toggle_reaction(&mut self.store, &self.backend, &message_id, &emoji)
            }),
            ShellCommand::Select(position) => self.message_at(position).map(|message_id| {
                self.store.toggle_message_selection(message_id);
                self.state.push_notice(format!(
                    "{} message(s) selected.",
                    self.store.selected_messages().len()
                ));
            }),
            ShellCommand::Forward { position, targets } => self.forward(position, &targets),
            ShellCommand::Search(query) => {
                search_messages(&self.store, &self.backend, &query).map(|results| {
                    self.state.set_panel(Panel::Search { query, results });
                })
            }
            ShellCommand::Help => {
                self.state.set_panel(Panel::Help);
                Ok(())
            }
            ShellCommand::Unknown(input) => {
                self.state
                    .push_notice(format!("Unknown command: {input}. Type /help for the list."));
                Ok(())
            }
        };

        if let Err(error) = result {
            tracing::debug!(code = SHELL_COMMAND_REJECTED, error = %error, "command rejected");
            // Write failures already surface through the store's error line.
            if error.is_validation() {
                self.state.push_notice(error.to_string());
            }
        }
        self.state.request_redraw();
    }

    fn open(&mut self, target: &str) -> Result<(), ChatError> {
        let channel_id = resolve_channel(&self.store, target)
            .ok_or_else(|| ChatError::ChannelNotFound(target.to_owned()))?;
        self.store.clear_error();
        open_channel(&mut self.store, &self.backend, &channel_id)?;
        self.state.set_panel(Panel::Conversation);
        Ok(())
    }

    fn forward(&mut self, position: Option<usize>, targets: &[String]) -> Result<(), ChatError> {
        let message_ids = match position {
            Some(position) => vec![self.message_at(position)?],
            None => {
                let channel_id = self
                    .store
                    .selected_channel_id()
                    .ok_or(ChatError::NoChannelSelected)?;
                self.store.selected_in_channel(channel_id)
            }
        };
        if message_ids.is_empty() {
            return Err(ChatError::NothingSelected);
        }

        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let channel_id = resolve_channel(&self.store, target)
                .ok_or_else(|| ChatError::ChannelNotFound(target.clone()))?;
            resolved.push(channel_id);
        }

        let now = self.clock.now();
        let mut delivered = 0;
        let mut complete = true;
        for message_id in &message_ids {
            let outcome =
                forward_message(&mut self.store, &self.backend, message_id, &resolved, now)?;
            delivered += outcome.delivered.len();
            complete &= outcome.is_complete();
        }
        if position.is_none() {
            self.store.clear_selected_messages();
        }

        let notice = match (message_ids.len(), complete) {
            (1, true) => format!("Forwarded to {delivered} channel(s)."),
            (count, true) => format!("Forwarded {count} messages to {} channel(s).", resolved.len()),
            (count, false) => format!(
                "Delivered {delivered} of {} forward(s).",
                count * resolved.len()
            ),
        };
        self.state.push_notice(notice);
        Ok(())
    }

    /// 1-based position among the open channel's visible messages.
    fn message_at(&self, position: usize) -> Result<MessageId, ChatError> {
        let channel_id = self
            .store
            .selected_channel_id()
            .ok_or(ChatError::NoChannelSelected)?;

        position
            .checked_sub(1)
            .and_then(|index| self.store.visible_messages(channel_id).get(index).copied())
            .map(|message| message.id.clone())
            .ok_or_else(|| ChatError::MessageNotFound(MessageId::new(format!("#{position}"))))
    }
}

/// Matches a channel by id, then by case-insensitive display name.
fn resolve_channel(store: &ChatStore, target: &str) -> Option<ChannelId> {
    let target = target.trim();
    let channels = store.directory().channels();

    if let Some(channel) = channels.iter().find(|channel| channel.id == target) {
        return Some(channel.id.clone());
    }

    let wanted = target.to_lowercase();
    channels
        .iter()
        .find(|channel| store.channel_name(channel).to_lowercase() == wanted)
        .or_else(|| {
            channels
                .iter()
                .find(|channel| store.channel_name(channel).to_lowercase().starts_with(&wanted))
        })
        .map(|channel| channel.id.clone())
}

impl<B, C> ShellOrchestrator for DefaultShellOrchestrator<B, C>
where
    B: ChatBackend + PushSource + IdentitySource,
    C: Clock,
{
    fn state(&self) -> &ShellState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    fn store(&self) -> &ChatStore {
        &self.store
    }

    fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Tick => self.on_tick(),
            AppEvent::QuitRequested => {
                end_session(
                    &mut self.store,
                    &self.backend,
                    &mut self.subscriptions,
                    self.clock.now(),
                );
                self.state.stop();
            }
            AppEvent::Command(command) => self.run_command(command),
        }

        Ok(())
    }
}
