//! tokenflight-file - Filesystem-backed storage and broadcast.
//!
//! Several processes pointed at one state directory share a session the
//! way browser tabs share an origin: [`FileStorage`] partitions hold the
//! persisted credentials and a [`FileChannel`] log carries session events
//! between them.

mod channel;
mod storage;

use std::path::{Path, PathBuf};

use tokenflight_core::StorageError;

pub use channel::{DEFAULT_LOG_LIMIT, FileChannel};
pub use storage::FileStorage;

/// Partition shared by every process using the directory.
pub const LOCAL_PARTITION: &str = "local";

/// Partition holding the anti-forgery token.
pub const SESSION_PARTITION: &str = "session";

/// A state directory and the backends living in it.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_storage(&self) -> Result<FileStorage, StorageError> {
        FileStorage::open(&self.root, LOCAL_PARTITION)
    }

    pub fn session_storage(&self) -> Result<FileStorage, StorageError> {
        FileStorage::open(&self.root, SESSION_PARTITION)
    }

    /// An endpoint on channel `name` with a fresh context id.
    pub fn channel(&self, name: &str) -> Result<FileChannel, StorageError> {
        FileChannel::open(&self.root, name)
    }
}
