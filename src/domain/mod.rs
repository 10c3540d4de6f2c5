//! Domain layer: chat entities, caches, and the client-side store.

pub mod channel;
pub mod channel_directory;
pub mod chat_store;
pub mod errors;
pub mod events;
pub mod message;
pub mod message_cache;
pub mod presence;
pub mod shell_state;
pub mod typing;
pub mod user;
