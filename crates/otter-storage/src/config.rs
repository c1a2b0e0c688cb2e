//! Configuration for the storage bridge.
//!
//! The bridge never decides where preferences live: it asks an
//! [`AppContext`] for the application's preferences directory on every call
//! and appends the store file name.

use crate::error::{StorageError, StorageResult};
use std::path::PathBuf;

/// File holding the store, relative to the preferences directory
pub const DEFAULT_FILE_NAME: &str = "default.xml";

/// Environment variable overriding the default preferences directory
pub const PREFERENCES_DIR_ENV: &str = "OTTER_PREFERENCES_DIR";

/// Host application context
pub trait AppContext: Send + Sync {
    /// Directory holding the application's preference files
    fn preferences_dir(&self) -> StorageResult<PathBuf>;
}

/// Context with a fixed preferences directory
#[derive(Debug, Clone)]
pub struct StaticContext {
    dir: PathBuf,
}

impl StaticContext {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AppContext for StaticContext {
    fn preferences_dir(&self) -> StorageResult<PathBuf> {
        if self.dir.as_os_str().is_empty() {
            return Err(StorageError::context("preferences directory is not set"));
        }
        if self.dir.is_absolute() {
            return Ok(self.dir.clone());
        }
        let cwd = std::env::current_dir().map_err(|e| {
            StorageError::context(format!(
                "cannot resolve relative preferences directory {}: {e}",
                self.dir.display()
            ))
        })?;
        Ok(cwd.join(&self.dir))
    }
}

/// Storage bridge configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory used by the default [`StaticContext`].
    /// Default: `$OTTER_PREFERENCES_DIR`, else `<data dir>/otter/preferences`
    pub preferences_dir: PathBuf,

    /// Store file name inside the preferences directory.
    /// Default: `default.xml`
    pub file_name: String,

    /// Runtime that runs worker tasks.
    /// Default: the runtime current at the time of each call
    pub runtime: Option<tokio::runtime::Handle>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let preferences_dir = std::env::var_os(PREFERENCES_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("otter/preferences")
            });

        Self {
            preferences_dir,
            file_name: DEFAULT_FILE_NAME.to_string(),
            runtime: None,
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferences directory.
    pub fn preferences_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preferences_dir = dir.into();
        self
    }

    /// Set the store file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Pin worker tasks to a runtime.
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.file_name, "default.xml");
        assert!(config.runtime.is_none());
        assert!(!config.preferences_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::new()
            .preferences_dir("/tmp/prefs")
            .file_name("other.xml");
        assert_eq!(config.preferences_dir, PathBuf::from("/tmp/prefs"));
        assert_eq!(config.file_name, "other.xml");
    }

    #[test]
    fn test_static_context() {
        let ctx = StaticContext::new("/data/app");
        assert_eq!(ctx.preferences_dir().unwrap(), PathBuf::from("/data/app"));
        assert!(StaticContext::new("").preferences_dir().is_err());
    }

    #[test]
    fn test_relative_dir_resolves_against_cwd() {
        let dir = StaticContext::new("prefs/app").preferences_dir().unwrap();
        assert!(dir.is_absolute());
        assert_eq!(dir, std::env::current_dir().unwrap().join("prefs/app"));
    }
}
