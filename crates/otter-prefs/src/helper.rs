//! Process-wide cache of open preferences

use crate::errno::{PrefsError, PrefsResult};
use crate::preferences::Preferences;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Open instances, keyed by file path
static INSTANCES: once_cell::sync::Lazy<Mutex<HashMap<PathBuf, Arc<Preferences>>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(HashMap::new()));

/// Entry point for obtaining [`Preferences`] by path.
///
/// Every caller asking for the same path shares one instance, so unflushed
/// writes are visible to all of them.
pub struct PreferencesHelper;

impl PreferencesHelper {
    /// Get the cached instance for `path`, opening it on first use.
    pub fn get_preferences(path: impl AsRef<Path>) -> PrefsResult<Arc<Preferences>> {
        let path = check_path(path.as_ref())?;

        if let Some(prefs) = INSTANCES.lock().get(&path) {
            return Ok(prefs.clone());
        }

        // Open outside the lock; a racing opener of the same path wins and
        // this instance is discarded.
        let opened = Arc::new(Preferences::open(&path)?);
        let prefs = INSTANCES.lock().entry(path).or_insert(opened).clone();
        Ok(prefs)
    }

    /// Drop the cached instance for `path`; the next lookup reloads the file.
    pub fn remove_from_cache(path: impl AsRef<Path>) -> PrefsResult<()> {
        let path = check_path(path.as_ref())?;
        if INSTANCES.lock().remove(&path).is_some() {
            debug!(path = %path.display(), "Evicted preferences from cache");
        }
        Ok(())
    }

    /// Drop the cached instance and delete the backing file.
    pub fn delete_preferences(path: impl AsRef<Path>) -> PrefsResult<()> {
        let path = check_path(path.as_ref())?;
        INSTANCES.lock().remove(&path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PrefsError::Io(e)),
        }
    }
}

fn check_path(path: &Path) -> PrefsResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(PrefsError::InvalidPath("path is empty".to_string()));
    }
    if !path.is_absolute() {
        return Err(PrefsError::InvalidPath(format!(
            "{} is not absolute",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}
