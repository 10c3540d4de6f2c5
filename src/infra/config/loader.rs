use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = AppConfig::default();

    if !config_path.exists() {
        return Ok(config);
    }

    let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
        path: config_path,
        source,
    })?;

    file_config.merge_into(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn returns_defaults_when_file_is_missing() {
        let config = load(Some(Path::new("./missing-config.toml"))).expect("config must load");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn merges_file_values_over_defaults() {
        let temp_dir = tempfile::tempdir().expect("must create temp dir");
        let config_path = temp_dir.path().join("commhub.toml");

        fs::write(
            &config_path,
            r#"[logging]
level = "debug"

[chat]
typing_idle_ms = 1500
supersede_window_secs = 30
history_limit = 120

[realtime]
enabled = false

[identity]
user_id = "bob"
"#,
        )
        .expect("must write test config");

        let config = load(Some(&config_path)).expect("config must load");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.directory, None);
        assert_eq!(config.chat.typing_idle_ms, 1500);
        assert_eq!(config.chat.typing_stale_ms, 5000);
        assert!(!config.realtime.enabled);
        assert_eq!(config.realtime.feed_capacity, 256);
        assert_eq!(config.identity.user_id, "bob");

        let settings = config.chat.store_settings();
        assert_eq!(settings.typing_idle_window, Duration::milliseconds(1500));
        assert_eq!(settings.supersede_window, Duration::seconds(30));
        assert_eq!(settings.history_limit, 120);
    }

    #[test]
    fn reports_malformed_file() {
        let temp_dir = tempfile::tempdir().expect("must create temp dir");
        let config_path = temp_dir.path().join("commhub.toml");
        fs::write(&config_path, "[chat\ntyping_idle_ms = ").expect("must write test config");

        let error = load(Some(&config_path)).expect_err("malformed config must fail");

        assert!(matches!(error, AppError::ConfigParse { .. }));
    }
}
