//! Persistent key-value storage trait.

use crate::error::StorageError;

/// Origin-scoped persistent key-value capability.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove several keys as one unit.
    ///
    /// Backends that can rewrite their whole partition at once should
    /// override this so other processes never see a subset removed.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.remove(key) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
