//! Sending and forwarding messages.
//!
//! A send is split around the durable write: the store inserts the optimistic
//! entry first, then the backend call's outcome reconciles or rolls it back.

use chrono::{DateTime, Utc};

use crate::domain::{
    channel::ChannelId,
    chat_store::{ChatStore, SendDraft},
    errors::ChatError,
    message::{Message, MessageId},
};

use super::contracts::{map_source_error, BackendError, ChatBackend};

const MESSAGE_SEND_FAILED: &str = "CHAT_MESSAGE_SEND_FAILED";
const MESSAGE_FORWARD_TARGET_FAILED: &str = "CHAT_MESSAGE_FORWARD_TARGET_FAILED";

/// Per-target result of a forward.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForwardOutcome {
    pub delivered: Vec<(ChannelId, MessageId)>,
    pub failed: Vec<(ChannelId, ChatError)>,
}

impl ForwardOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends `draft` and returns the server id of the confirmed message.
pub fn send_message(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    draft: SendDraft,
    now: DateTime<Utc>,
) -> Result<MessageId, ChatError> {
    let pending = store.begin_send(draft, now)?;

    let outcome = backend
        .insert_message(pending.payload())
        .map_err(map_source_error);
    if let Err(error) = &outcome {
        tracing::warn!(
            code = MESSAGE_SEND_FAILED,
            channel_id = pending.channel_id(),
            temp_id = %pending.temp_id(),
            error = %error,
            "message write failed"
        );
    }

    store.commit_send(pending, outcome)
}

/// Sends a copy of `message_id` into every target channel. A failing target
/// does not stop the remaining ones.
pub fn forward_message(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    message_id: &MessageId,
    targets: &[ChannelId],
    now: DateTime<Utc>,
) -> Result<ForwardOutcome, ChatError> {
    if targets.is_empty() {
        return Err(ChatError::NoForwardTargets);
    }
    store.current_user_id()?;
    if message_id.is_temporary() {
        return Err(ChatError::MessagePending(message_id.clone()));
    }

    let original = resolve_original(store, backend, message_id)?;
    let mut outcome = ForwardOutcome::default();

    for target in targets {
        match send_message(store, backend, SendDraft::forward(target, &original), now) {
            Ok(forwarded_id) => outcome.delivered.push((target.clone(), forwarded_id)),
            Err(error) => {
                tracing::warn!(
                    code = MESSAGE_FORWARD_TARGET_FAILED,
                    channel_id = %target,
                    message_id = %message_id,
                    error = %error,
                    "forward to channel failed"
                );
                outcome.failed.push((target.clone(), error));
            }
        }
    }

    Ok(outcome)
}

fn resolve_original(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    message_id: &MessageId,
) -> Result<Message, ChatError> {
    if let Some(original) = store.forward_source(message_id) {
        return Ok(original.clone());
    }

    backend.fetch_message(message_id).map_err(|error| {
        let error = match error {
            BackendError::NotFound => ChatError::MessageNotFound(message_id.clone()),
            other => map_source_error(other),
        };
        store.set_error(format!("Failed to forward message: {error}"));
        error
    })
}
