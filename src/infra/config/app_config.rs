use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::chat_store::StoreSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub chat: ChatConfig,
    pub realtime: RealtimeConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log file directory; the platform cache directory when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatConfig {
    pub typing_idle_ms: u64,
    pub typing_stale_ms: u64,
    pub supersede_window_secs: u64,
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_idle_ms: 2_000,
            typing_stale_ms: 5_000,
            supersede_window_secs: 60,
            history_limit: 50,
        }
    }
}

impl ChatConfig {
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            typing_idle_window: millis(self.typing_idle_ms),
            typing_stale_after: millis(self.typing_stale_ms),
            supersede_window: Duration::seconds(
                i64::try_from(self.supersede_window_secs).unwrap_or(i64::MAX / 1_000),
            ),
            history_limit: self.history_limit,
        }
    }
}

fn millis(value: u64) -> Duration {
    Duration::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub enabled: bool,
    pub feed_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    pub user_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: "alice".to_owned(),
        }
    }
}
