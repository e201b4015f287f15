//! File-backed key-value partitions.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument};

use tokenflight_core::{KeyValueStorage, StorageError};

type Entries = BTreeMap<String, String>;

pub(crate) fn map_io(err: std::io::Error) -> StorageError {
    StorageError::unavailable(format!("IO error: {}", err))
}

/// One storage partition kept as a JSON object in `<dir>/<partition>.json`.
///
/// Writers take an exclusive lock on `<partition>.lock` and replace the file
/// through a rename, so readers in other processes always see a complete
/// partition.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    /// Open (creating the directory if needed) the named partition.
    pub fn open(dir: impl AsRef<Path>, partition: &str) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(map_io)?;

        Ok(Self {
            path: dir.join(format!("{}.json", partition)),
            lock_path: dir.join(format!("{}.lock", partition)),
        })
    }

    /// Path of the partition file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(map_io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content).map_err(map_io)?;
        fs::rename(&temp_path, &self.path).map_err(map_io)?;
        Ok(())
    }

    fn lock(&self) -> Result<File, StorageError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(map_io)?;
        lock_file.lock_exclusive().map_err(map_io)?;
        Ok(lock_file)
    }

    /// Read-modify-write under the partition lock. `apply` returns whether
    /// anything changed.
    fn update(&self, apply: impl FnOnce(&mut Entries) -> bool) -> Result<(), StorageError> {
        let lock_file = self.lock()?;

        let mut entries = self.load()?;
        if apply(&mut entries) {
            self.persist(&entries)?;
        }

        FileExt::unlock(&lock_file).map_err(map_io)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })?;
        debug!("stored value");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|key, _| !keys.contains(&key.as_str()));
            entries.len() != before
        })
    }
}
