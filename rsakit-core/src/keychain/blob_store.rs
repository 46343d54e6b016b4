//! Atomic blob storage backing the software keychain.
//!
//! The keychain keeps its whole item table in one small blob. Writes must be
//! atomic so a crash leaves either the previous table or the new one, never a
//! torn file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

/// Errors raised by blob stores.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// An I/O operation failed.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// An in-memory lock was poisoned by a panicking writer.
    #[error("blob store lock poisoned")]
    Poisoned,
}

/// Result type for blob store operations.
pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

fn io_error(context: impl Into<String>, source: std::io::Error) -> BlobStoreError {
    BlobStoreError::Io {
        context: context.into(),
        source,
    }
}

/// Atomic storage for small named blobs.
///
/// Implementations must write with the write-to-temp-then-rename pattern (or
/// an equivalent) so readers observe either the old or the new content.
pub trait AtomicBlobStore: Send + Sync {
    /// Reads the blob `name`, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    fn read(&self, name: &str) -> BlobStoreResult<Option<Vec<u8>>>;

    /// Atomically replaces the blob `name` with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> BlobStoreResult<()>;

    /// Deletes the blob `name`. Deleting a missing blob succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete(&self, name: &str) -> BlobStoreResult<()>;
}

/// In-memory blob store. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> BlobStoreResult<usize> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| BlobStoreError::Poisoned)?
            .len())
    }

    /// Returns `true` if no blobs are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> BlobStoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl AtomicBlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> BlobStoreResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| BlobStoreError::Poisoned)?
            .get(name)
            .cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        self.blobs
            .write()
            .map_err(|_| BlobStoreError::Poisoned)?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> BlobStoreResult<()> {
        self.blobs
            .write()
            .map_err(|_| BlobStoreError::Poisoned)?
            .remove(name);
        Ok(())
    }
}

/// File-system blob store rooted at a directory.
///
/// Writes go to `.<name>.tmp`, are fsynced, renamed over the target, and the
/// directory is fsynced so the rename itself is durable.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    directory: PathBuf,
}

impl FileBlobStore {
    /// Opens a store in `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(directory: impl AsRef<Path>) -> BlobStoreResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| {
            io_error(
                format!("creating blob store directory '{}'", directory.display()),
                e,
            )
        })?;
        Ok(Self { directory })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!(".{name}.tmp"))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> BlobStoreResult<()> {
        File::open(&self.directory)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| io_error("syncing blob store directory", e))
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> BlobStoreResult<()> {
        // Directory handles cannot be synced here; rename is still atomic.
        Ok(())
    }
}

impl AtomicBlobStore for FileBlobStore {
    fn read(&self, name: &str) -> BlobStoreResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(format!("reading blob '{name}'"), e)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        let temp_path = self.temp_path(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| io_error(format!("creating temp file for '{name}'"), e))?;
        file.write_all(bytes)
            .map_err(|e| io_error(format!("writing temp file for '{name}'"), e))?;
        file.sync_all()
            .map_err(|e| io_error(format!("syncing temp file for '{name}'"), e))?;
        drop(file);

        fs::rename(&temp_path, self.blob_path(name)).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            io_error(format!("renaming temp file onto '{name}'"), e)
        })?;
        self.sync_directory()
    }

    fn delete(&self, name: &str) -> BlobStoreResult<()> {
        match fs::remove_file(self.blob_path(name)) {
            Ok(()) => self.sync_directory(),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(format!("deleting blob '{name}'"), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_blob_store_basic() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.read("items").unwrap().is_none());

        store.write_atomic("items", b"hello").unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.read("items").unwrap(), Some(b"hello".to_vec()));

        store.write_atomic("items", b"world").unwrap();
        assert_eq!(store.read("items").unwrap(), Some(b"world".to_vec()));

        store.delete("items").unwrap();
        assert!(store.read("items").unwrap().is_none());
        store.delete("items").unwrap();
    }

    #[test]
    fn test_file_blob_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("nested")).unwrap();

        assert!(store.read("items").unwrap().is_none());
        store.write_atomic("items", b"first").unwrap();
        store.write_atomic("items", b"second").unwrap();
        assert_eq!(store.read("items").unwrap(), Some(b"second".to_vec()));
        assert!(!store.temp_path("items").exists());

        let reopened = FileBlobStore::new(store.directory()).unwrap();
        assert_eq!(reopened.read("items").unwrap(), Some(b"second".to_vec()));

        reopened.delete("items").unwrap();
        assert!(reopened.read("items").unwrap().is_none());
        reopened.delete("items").unwrap();
    }
}
