//! File-based key/value store.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK                  # Advisory lock for single-writer
//! ├─ questline.state.val   # One file per key
//! └─ questline.prefs.val
//! ```

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const VALUE_EXT: &str = "val";
const TEMP_EXT: &str = "val.tmp";

/// A file-based key/value store.
///
/// Each key is stored in its own file. Writes go to a temporary file that
/// is synced and then renamed over the previous value, so a crash never
/// leaves a half-written snapshot behind.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on its directory for its
/// whole lifetime; only one `FileKvStore` may be open per directory.
/// Writes within the process are serialized by an internal mutex.
///
/// # Example
///
/// ```no_run
/// use questline_storage::{FileKvStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileKvStore::open(Path::new("state")).unwrap();
/// store.set("questline.state", "{\"updatedAt\":1}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileKvStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileKvStore {
    /// Opens or creates a store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{VALUE_EXT}")))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Keys map directly onto file names, so only a conservative character set is accepted.
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key != LOCK_FILE
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        let temp_path = self.dir.join(format!("{key}.{TEMP_EXT}"));
        let _guard = self.write_lock.lock();

        let mut file = File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        self.sync_directory()
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => self.sync_directory(),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
