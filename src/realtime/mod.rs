//! Push plumbing: relay tasks, subscription lifecycle and event application.

pub mod event_mapping;
pub mod relay;
pub mod subscription_manager;
