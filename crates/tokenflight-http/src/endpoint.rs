//! Refresh endpoint URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use tokenflight_core::{Error, InvalidInputError};

/// A validated token refresh endpoint.
///
/// Must be an absolute HTTPS URL; plain HTTP is accepted only for
/// loopback hosts.
///
/// # Example
///
/// ```
/// use tokenflight_http::RefreshEndpoint;
///
/// let endpoint = RefreshEndpoint::new("https://auth.example.com/api/refresh").unwrap();
/// assert_eq!(endpoint.host(), Some("auth.example.com"));
///
/// assert!(RefreshEndpoint::new("http://auth.example.com/refresh").is_err());
/// assert!(RefreshEndpoint::new("http://127.0.0.1:8080/refresh").is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefreshEndpoint(Url);

impl RefreshEndpoint {
    /// Parse and validate an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, relative, or insecure.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::Endpoint {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        let invalid = |reason: &str| -> Error {
            InvalidInputError::Endpoint {
                value: original.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if url.cannot_be_a_base() {
            return Err(invalid("must be an absolute URL"));
        }

        let Some(host) = url.host_str() else {
            return Err(invalid("must have a host"));
        };

        let is_loopback = matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1");
        match url.scheme() {
            "https" => Ok(()),
            "http" if is_loopback => Ok(()),
            _ => Err(invalid("must use HTTPS (HTTP allowed only for localhost)")),
        }
    }
}

impl fmt::Display for RefreshEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RefreshEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for RefreshEndpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for RefreshEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RefreshEndpoint::new(&s).map_err(serde::de::Error::custom)
    }
}
