//! Crash-safe TOML files.
//!
//! Writes go to a hidden sibling file that is fsynced and renamed over the
//! target, so readers see either the old or the new document. Read-modify-write
//! cycles additionally hold an exclusive `fs2` lock on a sibling `.lock` file.

use profcat_core::error::{CatalogError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A typed handle to one TOML document on disk.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing or blank file yields `None`.
    pub fn load(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(toml::from_str(&content)?))
    }

    /// Replaces the document with `data`.
    pub fn save(&self, data: &T) -> Result<()> {
        let document = toml::to_string_pretty(data)?;
        write_atomic(&self.path, document.as_bytes())
    }

    /// Loads (or starts from `default_value`), applies `f`, and saves, all
    /// under the exclusive lock.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let mut data = self.load()?.unwrap_or(default_value);
        f(&mut data)?;
        self.save(&data)?;
        Ok(data)
    }
}

/// Writes `bytes` to `path` through a fsynced temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CatalogError::io(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| CatalogError::io(format!("{} has no file name", path.display())))?;
    fs::create_dir_all(parent)?;

    let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(bytes)?;
    tmp.sync_all()?;
    drop(tmp);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Exclusive advisory lock, released when the handle is dropped.
///
/// The `.lock` file itself stays on disk: removing it while another waiter
/// holds a handle would let a third writer lock a fresh file alongside it.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| CatalogError::io(format!("Failed to lock {}: {}", lock_path.display(), e)))?;
        }

        Ok(Self { _file: file })
    }
}
