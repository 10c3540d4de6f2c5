use thiserror::Error;

use super::message::MessageId;

/// Engine-level failures. Validation variants are rejected before any write
/// is issued; the rest come from the durable write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("no channel selected")]
    NoChannelSelected,
    #[error("channel {0} is not available")]
    ChannelNotFound(String),
    #[error("message content is empty")]
    EmptyContent,
    #[error("reaction emoji is empty")]
    EmptyReaction,
    #[error("select at least one channel to forward to")]
    NoForwardTargets,
    #[error("select a message first (/select <n>)")]
    NothingSelected,
    #[error("message {0} was not found")]
    MessageNotFound(MessageId),
    #[error("message {0} is still being sent")]
    MessagePending(MessageId),
    #[error("only the sender may change this message")]
    NotMessageSender,
    #[error("not authorized")]
    Unauthorized,
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("service temporarily unavailable")]
    TemporarilyUnavailable,
}

impl ChatError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::NoChannelSelected
                | Self::ChannelNotFound(_)
                | Self::EmptyContent
                | Self::EmptyReaction
                | Self::NoForwardTargets
                | Self::NothingSelected
                | Self::MessageNotFound(_)
                | Self::MessagePending(_)
                | Self::NotMessageSender
        )
    }
}
