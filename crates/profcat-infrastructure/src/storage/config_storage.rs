//! Persistent `CatalogConfig`.

use super::atomic_toml::AtomicTomlFile;
use crate::paths::ProfcatPaths;
use anyhow::{Context, Result};
use profcat_core::config::CatalogConfig;
use std::path::PathBuf;

/// Reads and writes `config.toml`.
///
/// A missing or empty file is not an error: callers get the defaults and the
/// file is only created on the first save.
pub struct ConfigStorage {
    file: AtomicTomlFile<CatalogConfig>,
}

impl ConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Storage at the platform config location (`~/.config/profcat/config.toml`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(ProfcatPaths::config_file()?))
    }

    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    pub fn load(&self) -> Result<CatalogConfig> {
        let loaded = self
            .file
            .load()
            .with_context(|| format!("Failed to read {}", self.file.path().display()))?;
        if loaded.is_none() {
            tracing::debug!(path = %self.file.path().display(), "No config file, using defaults");
        }
        Ok(loaded.unwrap_or_default())
    }

    pub fn save(&self, config: &CatalogConfig) -> Result<()> {
        self.file
            .save(config)
            .with_context(|| format!("Failed to write {}", self.file.path().display()))?;
        tracing::info!(path = %self.file.path().display(), "Saved config");
        Ok(())
    }

    /// Applies `f` to the stored config under the file lock and returns the result.
    pub fn update<F>(&self, f: F) -> Result<CatalogConfig>
    where
        F: FnOnce(&mut CatalogConfig),
    {
        let updated = self.file.update(CatalogConfig::default(), |config| {
            f(config);
            Ok(())
        })?;
        Ok(updated)
    }

    /// Resolves the spool directory: the configured one, or the platform default.
    pub fn spool_dir(config: &CatalogConfig) -> Result<PathBuf> {
        match &config.spool_dir {
            Some(dir) => Ok(dir.clone()),
            None => ProfcatPaths::spool_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));
        assert_eq!(storage.load().unwrap(), CatalogConfig::default());
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = 1000\n").unwrap();

        let config = ConfigStorage::new(path).load().unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.log_filter, "info");
        assert!(config.import_enabled("hprof"));
    }

    #[test]
    fn test_save_then_update() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));

        let mut config = CatalogConfig::default();
        config.spool_dir = Some(temp_dir.path().join("streams"));
        storage.save(&config).unwrap();

        let updated = storage
            .update(|config| config.import_extensions = vec!["trace".to_string()])
            .unwrap();
        assert_eq!(updated.spool_dir, config.spool_dir);
        assert!(!updated.import_enabled("hprof"));

        let reloaded = storage.load().unwrap();
        assert_eq!(reloaded, updated);
        assert_eq!(
            ConfigStorage::spool_dir(&reloaded).unwrap(),
            temp_dir.path().join("streams")
        );
    }
}
