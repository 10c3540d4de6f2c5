//! Console layer: line input, text frames and the shell loop.

mod commands;
pub mod event_source;
mod message_rendering;
pub mod shell;
mod view;
