//! File-locked, atomically-written JSON metadata documents
//!
//! Both stores keep their authoritative state in a single small JSON
//! document (`metadata.json`, `versions_metadata.json`). Separate CLI
//! invocations can mutate the same document concurrently, so every
//! read-modify-write runs under an exclusive advisory lock on a sidecar
//! lock file, and the rewritten document is renamed into place atomically.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A JSON document on disk that owns its persisted representation.
///
/// The sidecar lock file (`<document>.lock`) exists so the document itself
/// can be replaced by rename while the lock stays valid; locking the
/// document inode directly would leave a window after each rename.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    lock_path: PathBuf,
}

fn lock_shared(file: &File) -> std::io::Result<()> {
    fs4::fs_std::FileExt::lock_shared(file)
}

fn lock_exclusive(file: &File) -> std::io::Result<()> {
    fs4::fs_std::FileExt::lock_exclusive(file)
}

impl MetadataStore {
    /// Create a store for the document at `path`.
    ///
    /// Nothing is touched on disk until the first read or update.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
        }
    }

    /// Path of the underlying document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document under a shared lock.
    ///
    /// A document that does not exist yet reads as `T::default()`.
    pub fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let lock = self.open_lock()?;
        lock_shared(&lock).map_err(|e| {
            Error::configuration(format!(
                "Failed to acquire shared lock on {}: {e}",
                self.lock_path.display()
            ))
        })?;
        let doc = self.read_unlocked();
        // Lock released when the handle drops
        drop(lock);
        doc
    }

    /// Apply a mutation to the document under an exclusive lock.
    ///
    /// The document is re-read inside the critical section, so the closure
    /// always sees the latest persisted state, never a stale copy. If the
    /// closure fails, nothing is written and the document is untouched.
    pub fn update<T, R>(&self, mutate: impl FnOnce(&mut T) -> Result<R>) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let lock = self.open_lock()?;
        lock_exclusive(&lock).map_err(|e| {
            Error::configuration(format!(
                "Failed to acquire exclusive lock on {}: {e}",
                self.lock_path.display()
            ))
        })?;

        let mut doc: T = self.read_unlocked()?;
        let outcome = mutate(&mut doc)?;
        self.write_unlocked(&doc)?;

        drop(lock);
        Ok(outcome)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| Error::io(e, &self.lock_path, "open"))
    }

    fn read_unlocked<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "metadata document absent, using default");
            return Ok(T::default());
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|e| Error::io(e, &self.path, "read"))?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::serialization(format!(
                "Failed to parse metadata document {}: {e}",
                self.path.display()
            ))
        })
    }

    fn write_unlocked<T: Serialize>(&self, doc: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::serialization(format!("Failed to serialize metadata: {e}")))?;

        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match parent {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
        .map_err(|e| Error::io_no_path(e, "create temp file"))?;

        tmp.write_all(contents.as_bytes())
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync_all"))?;

        // Readers observe either the old or the new document, never a
        // partial write.
        tmp.persist(&self.path)
            .map_err(|e| Error::io(e.error, &self.path, "rename"))?;
        Ok(())
    }
}

/// Write raw bytes to `dest` via a temp file in the same directory and an
/// atomic rename, so a concurrent reader never observes a partial blob.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            Error::configuration(format!("blob path {} has no parent", dest.display()))
        })?;
    fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::io_no_path(e, "create temp file"))?;
    tmp.write_all(bytes)
        .map_err(|e| Error::io(e, tmp.path(), "write"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(e, tmp.path(), "sync_all"))?;
    tmp.persist(dest)
        .map_err(|e| Error::io(e.error, dest, "rename"))?;
    Ok(())
}
