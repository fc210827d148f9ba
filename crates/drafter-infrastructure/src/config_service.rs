//! Configuration service implementation.
//!
//! Loads `DrafterConfig` from `config.toml` and caches it.

use crate::paths::DrafterPaths;
use drafter_core::config::DrafterConfig;
use drafter_core::error::{DrafterError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the configuration file.
///
/// A missing file yields the defaults; a file that exists but fails to
/// parse is an error, so typos are not silently ignored.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<DrafterConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the default `~/.config/drafter/config.toml`.
    pub fn new() -> Result<Self> {
        let path = DrafterPaths::config_file().map_err(|e| DrafterError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    /// Creates a service reading an explicit file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<DrafterConfig> {
        if let Some(cached) = self
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return Ok(cached.clone());
        }

        let loaded = Self::load(&self.path)?;
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn load(path: &Path) -> Result<DrafterConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(DrafterConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(DrafterConfig::default());
        }

        let config: DrafterConfig = toml::from_str(&content)?;
        tracing::info!("[ConfigService] Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(dir.path().join("config.toml"));
        assert_eq!(service.get_config().unwrap(), DrafterConfig::default());
    }

    #[test]
    fn test_loads_and_caches_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[save]\ndebounce_ms = 300\n").unwrap();

        let service = ConfigService::with_path(&path);
        assert_eq!(service.get_config().unwrap().save.debounce_ms, 300);

        fs::write(&path, "[save]\ndebounce_ms = 900\n").unwrap();
        assert_eq!(service.get_config().unwrap().save.debounce_ms, 300);

        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().save.debounce_ms, 900);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[save\n").unwrap();

        let err = ConfigService::with_path(&path).get_config().unwrap_err();
        assert!(matches!(err, DrafterError::Serialization { .. }));
    }
}
