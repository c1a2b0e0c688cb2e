//! Preferences instance backed by a single XML file

use crate::errno::{PrefsError, PrefsResult};
use crate::xml;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum key length, in bytes
pub const MAX_KEY_LENGTH: usize = 80;

/// Maximum value length, in bytes
pub const MAX_VALUE_LENGTH: usize = 8 * 1024;

struct Inner {
    values: BTreeMap<String, String>,
    /// Set when `values` differs from what is on disk
    dirty: bool,
}

/// String preferences loaded from `path`.
///
/// Mutations stay in memory until [`Preferences::flush`] writes them back.
pub struct Preferences {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl Preferences {
    /// Open the preferences file at `path`.
    ///
    /// A missing file yields an empty store; the file and its parent
    /// directories are created on the first flush.
    pub fn open(path: impl AsRef<Path>) -> PrefsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let values = match fs::read_to_string(&path) {
            Ok(text) => xml::decode(&text, &shown).inspect_err(|e| {
                warn!(path = %shown, error = %e, "Failed to load preferences file");
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(PrefsError::Io(e)),
        };

        debug!(path = %shown, entries = values.len(), "Opened preferences");

        Ok(Self {
            path,
            inner: RwLock::new(Inner {
                values,
                dirty: false,
            }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the value for `key`, or `default` when the key is absent.
    ///
    /// Keys that could never have been stored (empty or too long) also
    /// return `default`.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        if check_key(key).is_err() {
            return default.to_string();
        }
        self.inner
            .read()
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn put_string(&self, key: &str, value: &str) -> PrefsResult<()> {
        check_entry(key, value)?;
        let mut inner = self.inner.write();
        if insert(&mut inner.values, key, value) {
            inner.dirty = true;
        }
        Ok(())
    }

    /// [`Preferences::put_string`] followed by a flush.
    ///
    /// If the flush fails the entry is put back the way it was.
    pub fn put_and_flush(&self, key: &str, value: &str) -> PrefsResult<()> {
        check_entry(key, value)?;
        self.commit(|values| insert(values, key, value))
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.read().values.contains_key(key)
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> PrefsResult<()> {
        check_key(key)?;
        let mut inner = self.inner.write();
        if inner.values.remove(key).is_some() {
            inner.dirty = true;
        }
        Ok(())
    }

    /// [`Preferences::delete`] followed by a flush, undone if the flush fails
    pub fn delete_and_flush(&self, key: &str) -> PrefsResult<()> {
        check_key(key)?;
        self.commit(|values| values.remove(key).is_some())
    }

    pub fn clear(&self) -> PrefsResult<()> {
        let mut inner = self.inner.write();
        if !inner.values.is_empty() {
            inner.values.clear();
            inner.dirty = true;
        }
        Ok(())
    }

    /// [`Preferences::clear`] followed by a flush, undone if the flush fails
    pub fn clear_and_flush(&self) -> PrefsResult<()> {
        self.commit(|values| {
            let changed = !values.is_empty();
            values.clear();
            changed
        })
    }

    /// Snapshot of every stored entry
    pub fn all(&self) -> BTreeMap<String, String> {
        self.inner.read().values.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().values.is_empty()
    }

    /// Write pending changes to disk.
    ///
    /// The file is replaced atomically through a sibling temp file.
    pub fn flush(&self) -> PrefsResult<()> {
        let mut inner = self.inner.write();
        self.write_file(&mut *inner)
    }

    /// Apply `mutate` and flush under one lock, restoring the previous
    /// entries when the write fails.
    fn commit<F>(&self, mutate: F) -> PrefsResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut inner = self.inner.write();
        let snapshot = inner.values.clone();
        let was_dirty = inner.dirty;

        if mutate(&mut inner.values) {
            inner.dirty = true;
        }

        if let Err(e) = self.write_file(&mut *inner) {
            warn!(path = %self.path.display(), error = %e, "Flush failed, rolling back");
            inner.values = snapshot;
            inner.dirty = was_dirty;
            return Err(e);
        }
        Ok(())
    }

    fn write_file(&self, inner: &mut Inner) -> PrefsResult<()> {
        if !inner.dirty {
            return Ok(());
        }

        let bytes = xml::encode(&inner.values)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(PrefsError::Io(e));
        }

        inner.dirty = false;
        debug!(path = %self.path.display(), entries = inner.values.len(), "Flushed preferences");
        Ok(())
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

fn check_key(key: &str) -> PrefsResult<()> {
    if key.is_empty() {
        return Err(PrefsError::KeyEmpty);
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(PrefsError::KeyTooLong {
            max: MAX_KEY_LENGTH,
        });
    }
    Ok(())
}

fn check_entry(key: &str, value: &str) -> PrefsResult<()> {
    check_key(key)?;
    if value.len() > MAX_VALUE_LENGTH {
        return Err(PrefsError::ValueTooLong {
            max: MAX_VALUE_LENGTH,
        });
    }
    Ok(())
}

/// Returns whether the map changed
fn insert(values: &mut BTreeMap<String, String>, key: &str, value: &str) -> bool {
    if values.get(key).map(String::as_str) == Some(value) {
        return false;
    }
    values.insert(key.to_string(), value.to_string());
    true
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
