//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// An access token is refreshed once `now >= expires_at - safety_margin`.
    #[serde(with = "duration_ms")]
    pub safety_margin: Duration,

    /// Lifetime assumed when a session is established without one.
    #[serde(with = "duration_ms")]
    pub default_expires_in: Duration,

    /// What to do with a refresh token returned by the transport.
    pub rotation: RefreshRotation,

    /// Size of a generated anti-forgery token, in bytes.
    pub anti_forgery_bytes: usize,

    /// Name of the cross-context broadcast channel. Endpoints only hear
    /// others opened under the same name.
    pub channel_name: String,

    pub storage_keys: StorageKeys,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(60),
            default_expires_in: Duration::from_secs(900),
            rotation: RefreshRotation::FollowResponse,
            anti_forgery_bytes: 32,
            channel_name: "auth_events".to_string(),
            storage_keys: StorageKeys::default(),
        }
    }
}

/// Refresh token rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshRotation {
    /// Replace the stored refresh token whenever the response carries one.
    #[default]
    FollowResponse,
    /// Keep the original refresh token for the life of the session.
    KeepExisting,
}

/// Storage keys for the persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub refresh_token: String,
    pub expires_at: String,
    /// Lives in the separately clearable session partition.
    pub anti_forgery_token: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            refresh_token: "refresh_token".to_string(),
            expires_at: "token_expires_at".to_string(),
            anti_forgery_token: "csrf_token".to_string(),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
