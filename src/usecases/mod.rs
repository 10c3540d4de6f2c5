//! Use case layer: chat workflows and shell orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod delete_message;
pub mod edit_message;
pub mod list_channels;
pub mod load_messages;
pub mod presence;
pub mod react_to_message;
pub mod search_messages;
pub mod select_channel;
pub mod send_message;
pub mod session;
pub mod shell;
