use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, ChatConfig, IdentityConfig, LogConfig, RealtimeConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub chat: Option<FileChatConfig>,
    pub realtime: Option<FileRealtimeConfig>,
    pub identity: Option<FileIdentityConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(chat) = self.chat {
            chat.merge_into(&mut config.chat);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }

        if let Some(identity) = self.identity {
            identity.merge_into(&mut config.identity);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub directory: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(directory) = self.directory {
            config.directory = Some(directory);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileChatConfig {
    pub typing_idle_ms: Option<u64>,
    pub typing_stale_ms: Option<u64>,
    pub supersede_window_secs: Option<u64>,
    pub history_limit: Option<usize>,
}

impl FileChatConfig {
    fn merge_into(self, config: &mut ChatConfig) {
        if let Some(idle_ms) = self.typing_idle_ms {
            config.typing_idle_ms = idle_ms;
        }

        if let Some(stale_ms) = self.typing_stale_ms {
            config.typing_stale_ms = stale_ms;
        }

        if let Some(window_secs) = self.supersede_window_secs {
            config.supersede_window_secs = window_secs;
        }

        if let Some(limit) = self.history_limit {
            config.history_limit = limit;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub enabled: Option<bool>,
    pub feed_capacity: Option<usize>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }

        if let Some(capacity) = self.feed_capacity {
            config.feed_capacity = capacity;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileIdentityConfig {
    pub user_id: Option<String>,
}

impl FileIdentityConfig {
    fn merge_into(self, config: &mut IdentityConfig) {
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }
    }
}
