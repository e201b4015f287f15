//! Transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::RefreshEndpoint;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(900);

/// Settings for an [`HttpRefreshTransport`](crate::HttpRefreshTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    pub endpoint: RefreshEndpoint,

    /// Whole-request timeout. Expiry is reported as unreachable.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Access token lifetime assumed when the response omits `expires_in`.
    #[serde(default = "default_expires_in", with = "duration_secs")]
    pub default_expires_in: Duration,
}

impl HttpTransportConfig {
    pub fn new(endpoint: RefreshEndpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            default_expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_default_expires_in(mut self, expires_in: Duration) -> Self {
        self.default_expires_in = expires_in;
        self
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_expires_in() -> Duration {
    DEFAULT_EXPIRES_IN
}

fn default_user_agent() -> String {
    concat!("tokenflight/", env!("CARGO_PKG_VERSION")).to_string()
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: HttpTransportConfig =
            serde_json::from_str(r#"{"endpoint": "https://auth.example.com/refresh"}"#).unwrap();

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.default_expires_in, Duration::from_secs(900));
        assert!(config.user_agent.starts_with("tokenflight/"));
    }

    #[test]
    fn builder_overrides() {
        let endpoint = RefreshEndpoint::new("https://auth.example.com/refresh").unwrap();
        let config = HttpTransportConfig::new(endpoint)
            .with_timeout(Duration::from_millis(250))
            .with_user_agent("probe/1");

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.user_agent, "probe/1");
    }
}
