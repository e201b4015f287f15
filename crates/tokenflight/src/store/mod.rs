//! Credential Store: the persisted half of the session record.
//!
//! The refresh token and its expiry live in the origin-wide partition; the
//! anti-forgery token lives in a separately clearable session partition.
//! The access token is never persisted.

mod memory;

pub use memory::MemoryStorage;

use std::sync::{Arc, Mutex};

use tracing::{debug, instrument, warn};

use tokenflight_core::error::StorageError;
use tokenflight_core::{AntiForgeryToken, KeyValueStorage, RandomSource, RefreshToken, random_hex};

use crate::config::StorageKeys;
use crate::sync::MutexExt;

/// Snapshot of the persisted session fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub refresh_token: Option<RefreshToken>,
    /// Epoch milliseconds.
    pub expires_at: Option<i64>,
    pub anti_forgery_token: Option<AntiForgeryToken>,
}

impl SessionRecord {
    /// No refresh token means no session.
    pub fn is_logged_out(&self) -> bool {
        self.refresh_token.is_none()
    }

    /// True when none of the persisted fields remain.
    pub fn is_empty(&self) -> bool {
        self.refresh_token.is_none()
            && self.expires_at.is_none()
            && self.anti_forgery_token.is_none()
    }
}

/// Fields to merge into the persisted record. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub refresh_token: Option<RefreshToken>,
    pub expires_at: Option<i64>,
    pub anti_forgery_token: Option<AntiForgeryToken>,
}

/// Read/write/clear access to the persisted session record.
pub struct CredentialStore {
    local: Arc<dyn KeyValueStorage>,
    session: Arc<dyn KeyValueStorage>,
    keys: StorageKeys,
    // Serializes operations within this process so no reader sees a
    // half-applied write or clear.
    guard: Mutex<()>,
}

impl CredentialStore {
    /// Create a store over an origin-wide partition and a session partition.
    pub fn new(
        local: Arc<dyn KeyValueStorage>,
        session: Arc<dyn KeyValueStorage>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            local,
            session,
            keys,
            guard: Mutex::new(()),
        }
    }

    /// Read the record. Never fails: unreadable fields are absent.
    pub fn read(&self) -> SessionRecord {
        let _guard = self.guard.lock_or_recover();

        let refresh_token = read_key(self.local.as_ref(), &self.keys.refresh_token)
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new);

        let expires_at = read_key(self.local.as_ref(), &self.keys.expires_at).and_then(|raw| {
            match raw.trim().parse::<i64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %self.keys.expires_at, error = %e, "ignoring unparseable expiry");
                    None
                }
            }
        });

        SessionRecord {
            refresh_token,
            expires_at,
            anti_forgery_token: self.read_anti_forgery(),
        }
    }

    /// Merge fields into the record.
    ///
    /// The refresh token is written before the expiry, so `expires_at`
    /// never lands ahead of the credential it describes. A failed write
    /// stops before the fields that follow it.
    #[instrument(skip_all)]
    pub fn write(&self, update: RecordUpdate) -> Result<(), StorageError> {
        let _guard = self.guard.lock_or_recover();

        if let Some(token) = &update.refresh_token {
            self.local.set(&self.keys.refresh_token, token.as_str())?;
        }
        if let Some(token) = &update.anti_forgery_token {
            self.session
                .set(&self.keys.anti_forgery_token, token.as_str())?;
        }
        if let Some(expires_at) = update.expires_at {
            self.local
                .set(&self.keys.expires_at, &expires_at.to_string())?;
        }

        debug!(
            refresh_token = update.refresh_token.is_some(),
            expires_at = ?update.expires_at,
            "session record updated"
        );
        Ok(())
    }

    /// Remove refresh token, expiry, and anti-forgery token as one unit.
    ///
    /// Every removal is attempted even if an earlier one fails.
    #[instrument(skip_all)]
    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.guard.lock_or_recover();

        // Refresh token first: a concurrent reader in another process that
        // sees only part of the removal still sees a logged-out record.
        let local = self
            .local
            .remove_all(&[self.keys.refresh_token.as_str(), self.keys.expires_at.as_str()]);
        let session = self.session.remove(&self.keys.anti_forgery_token);

        if let Err(e) = &local {
            warn!(error = %e, "failed to clear persisted credentials");
        }
        if let Err(e) = &session {
            warn!(error = %e, "failed to clear anti-forgery token");
        }

        debug!("session record cleared");
        local.and(session)
    }

    /// Current anti-forgery token, if one exists.
    pub fn anti_forgery_token(&self) -> Option<AntiForgeryToken> {
        let _guard = self.guard.lock_or_recover();
        self.read_anti_forgery()
    }

    /// Return the anti-forgery token, generating and persisting one first
    /// if the session partition has none.
    pub fn ensure_anti_forgery_token(
        &self,
        random: &dyn RandomSource,
        byte_count: usize,
    ) -> tokenflight_core::Result<AntiForgeryToken> {
        let _guard = self.guard.lock_or_recover();

        if let Some(existing) = self.read_anti_forgery() {
            return Ok(existing);
        }

        let token = AntiForgeryToken::new(random_hex(random, byte_count)?);
        self.session
            .set(&self.keys.anti_forgery_token, token.as_str())?;
        debug!("generated anti-forgery token");
        Ok(token)
    }

    fn read_anti_forgery(&self) -> Option<AntiForgeryToken> {
        read_key(self.session.as_ref(), &self.keys.anti_forgery_token)
            .filter(|t| !t.is_empty())
            .map(AntiForgeryToken::new)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

fn read_key(storage: &dyn KeyValueStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(%key, error = %e, "storage read failed, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use tokenflight_core::error::RandomUnavailable;

    fn store() -> (CredentialStore, MemoryStorage, MemoryStorage) {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = CredentialStore::new(
            Arc::new(local.clone()),
            Arc::new(session.clone()),
            StorageKeys::default(),
        );
        (store, local, session)
    }

    struct FailingStorage;

    impl KeyValueStorage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::unavailable("quota exceeded"))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::unavailable("quota exceeded"))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::unavailable("quota exceeded"))
        }
    }

    struct NoEntropy;

    impl RandomSource for NoEntropy {
        fn fill_bytes(&self, _dest: &mut [u8]) -> Result<(), RandomUnavailable> {
            Err(RandomUnavailable::new("no crypto"))
        }
    }

    #[test]
    fn empty_store_reads_as_logged_out() {
        let (store, _, _) = store();
        let record = store.read();
        assert!(record.is_logged_out());
        assert!(record.is_empty());
    }

    #[test]
    fn write_merges_fields() {
        let (store, local, _) = store();

        store
            .write(RecordUpdate {
                refresh_token: Some(RefreshToken::new("r1")),
                expires_at: Some(1_000),
                ..Default::default()
            })
            .unwrap();
        store
            .write(RecordUpdate {
                expires_at: Some(2_000),
                ..Default::default()
            })
            .unwrap();

        let record = store.read();
        assert_eq!(record.refresh_token, Some(RefreshToken::new("r1")));
        assert_eq!(record.expires_at, Some(2_000));
        assert_eq!(local.get("token_expires_at").unwrap().as_deref(), Some("2000"));
    }

    #[test]
    fn clear_removes_every_field() {
        let (store, local, session) = store();
        store
            .write(RecordUpdate {
                refresh_token: Some(RefreshToken::new("r1")),
                expires_at: Some(1_000),
                anti_forgery_token: Some(AntiForgeryToken::new("csrf")),
            })
            .unwrap();

        store.clear().unwrap();

        assert!(store.read().is_empty());
        assert!(local.is_empty());
        assert!(session.is_empty());
    }

    #[test]
    fn unparseable_expiry_is_absent() {
        let (store, local, _) = store();
        local.set("refresh_token", "r1").unwrap();
        local.set("token_expires_at", "soon").unwrap();

        let record = store.read();
        assert!(!record.is_logged_out());
        assert_eq!(record.expires_at, None);
    }

    #[test]
    fn read_never_fails_on_broken_backend() {
        let store = CredentialStore::new(
            Arc::new(FailingStorage),
            Arc::new(FailingStorage),
            StorageKeys::default(),
        );
        assert!(store.read().is_empty());
        assert!(store.clear().is_err());
    }

    #[test]
    fn anti_forgery_token_is_generated_once() {
        let (store, _, session) = store();
        let random = SeededRandom::new(7);

        let first = store.ensure_anti_forgery_token(&random, 32).unwrap();
        let second = store.ensure_anti_forgery_token(&random, 32).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert_eq!(
            session.get("csrf_token").unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[test]
    fn anti_forgery_generation_reports_missing_randomness() {
        let (store, _, session) = store();
        let err = store.ensure_anti_forgery_token(&NoEntropy, 32).unwrap_err();
        assert!(matches!(err, tokenflight_core::Error::Random(_)));
        assert!(session.is_empty());
    }
}
