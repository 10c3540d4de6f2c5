use std::{fs, path::PathBuf};

use crate::infra::error::AppError;

const APP_DIR_NAME: &str = "commhub";

/// Where the client keeps files on disk. Only logs live there today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub log_dir: PathBuf,
}

impl StorageLayout {
    /// Uses `configured` when set, otherwise the platform cache directory.
    pub fn resolve(configured: Option<&PathBuf>) -> Result<Self, AppError> {
        let log_dir = match configured {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|cache| cache.join(APP_DIR_NAME).join("logs"))
                .ok_or_else(|| AppError::StoragePathResolution {
                    details: "unable to resolve platform cache directory".into(),
                })?,
        };

        Ok(Self { log_dir })
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.log_dir).map_err(|source| AppError::StorageDirCreate {
            path: self.log_dir.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directory_wins() {
        let temp_dir = tempfile::tempdir().expect("must create temp dir");
        let configured = temp_dir.path().join("logs");

        let layout = StorageLayout::resolve(Some(&configured)).expect("layout should resolve");
        layout.ensure_dirs().expect("dirs should be created");

        assert_eq!(layout.log_dir, configured);
        assert!(configured.is_dir());
    }
}
