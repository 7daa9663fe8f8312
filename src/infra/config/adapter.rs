use std::path::{Path, PathBuf};

use crate::infra::{
    config::{load, AppConfig},
    contracts::ConfigAdapter,
    error::AppError,
    storage_layout::StorageLayout,
};

/// Reads config from an explicit path, `./config.toml`, or the per-user config dir.
#[derive(Debug, Clone, Default)]
pub struct FileConfigAdapter {
    path: Option<PathBuf>,
}

impl FileConfigAdapter {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Some(local);
        }

        StorageLayout::resolve()
            .ok()
            .map(|layout| layout.config_file())
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn load(&self) -> Result<AppConfig, AppError> {
        load(self.resolve_path().as_deref())
    }
}
