use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::infra::{
    config::{load, AppConfig},
    contracts::ConfigAdapter,
};

const CONFIG_PATH_ENV: &str = "COMMHUB_CONFIG";
const USER_ENV: &str = "COMMHUB_USER";

/// Loads `config.toml` layers. An explicit `--config` path wins over
/// `COMMHUB_CONFIG`; `COMMHUB_USER` replaces the configured identity so
/// several consoles can share one file.
#[derive(Debug, Clone, Default)]
pub struct FileConfigAdapter {
    path: Option<PathBuf>,
    user_override: Option<String>,
}

impl FileConfigAdapter {
    pub fn new(path: Option<&Path>) -> Self {
        Self::with_overrides(
            path,
            env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            env::var(USER_ENV).ok(),
        )
    }

    fn with_overrides(
        path: Option<&Path>,
        env_path: Option<PathBuf>,
        user_override: Option<String>,
    ) -> Self {
        Self {
            path: path.map(Path::to_path_buf).or(env_path),
            user_override: user_override
                .map(|user| user.trim().to_owned())
                .filter(|user| !user.is_empty()),
        }
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        let mut config = load(self.path.as_deref())?;
        if let Some(user_id) = &self.user_override {
            config.identity.user_id = user_id.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn explicit_path_wins_over_environment() {
        let adapter = FileConfigAdapter::with_overrides(
            Some(Path::new("cli.toml")),
            Some(PathBuf::from("env.toml")),
            None,
        );

        assert_eq!(adapter.path.as_deref(), Some(Path::new("cli.toml")));
    }

    #[test]
    fn user_override_replaces_configured_identity() {
        let temp_dir = tempfile::tempdir().expect("must create temp dir");
        let config_path = temp_dir.path().join("commhub.toml");
        fs::write(&config_path, "[identity]\nuser_id = \"bob\"\n").expect("must write config");

        let adapter = FileConfigAdapter::with_overrides(
            None,
            Some(config_path),
            Some(" carol ".to_owned()),
        );
        let config = adapter.load().expect("config must load");

        assert_eq!(config.identity.user_id, "carol");
    }

    #[test]
    fn blank_user_override_is_ignored() {
        let adapter = FileConfigAdapter::with_overrides(
            Some(Path::new("./missing-config.toml")),
            None,
            Some("  ".to_owned()),
        );

        let config = adapter.load().expect("config must load");

        assert_eq!(config.identity.user_id, "alice");
    }
}
