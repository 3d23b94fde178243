//! Injectable load/save seam so the relay never touches the filesystem itself.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{load_config, save_config, Config};

/// Source of the persisted relay configuration.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<Config>;
    fn save(&self, config: &Config) -> Result<()>;

    /// Load the current stored config, apply `edit`, and write it back.
    ///
    /// Always starts from what is stored now, never from an earlier snapshot,
    /// so concurrent edits from another process are kept.
    fn update<F>(&self, edit: F) -> Result<Config>
    where
        F: FnOnce(&mut Config),
        Self: Sized,
    {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

/// Provider backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for JsonFileProvider {
    fn load(&self) -> Result<Config> {
        load_config(&self.path)
    }

    fn save(&self, config: &Config) -> Result<()> {
        save_config(&self.path, config)
    }
}
