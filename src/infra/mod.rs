//! Infrastructure layer: config, logging, and the in-process chat backend.

pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod memory_backend;
pub mod storage_layout;
pub mod stubs;
