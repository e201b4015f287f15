//! JSON bodies exchanged with the refresh endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct RefreshBody<'a> {
    pub refresh_token: &'a str,
}

/// Success body. Both snake_case and camelCase field names are accepted.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    /// Seconds.
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<u64>,
}

/// Error body, when the server sends one.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn describe(&self) -> Option<String> {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => Some(format!("{}: {}", error, message)),
            (Some(text), None) | (None, Some(text)) => Some(text.clone()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_response() {
        let body: RefreshResponse = serde_json::from_str(
            r#"{"accessToken": "a1", "refreshToken": "r2", "expiresIn": 300}"#,
        )
        .unwrap();
        assert_eq!(body.access_token, "a1");
        assert_eq!(body.refresh_token.as_deref(), Some("r2"));
        assert_eq!(body.expires_in, Some(300));
    }

    #[test]
    fn optional_fields_default() {
        let body: RefreshResponse = serde_json::from_str(r#"{"access_token": "a1"}"#).unwrap();
        assert!(body.refresh_token.is_none());
        assert!(body.expires_in.is_none());
    }

    #[test]
    fn error_description() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"error": "invalid_grant", "message": "revoked"}"#).unwrap();
        assert_eq!(body.describe().as_deref(), Some("invalid_grant: revoked"));
        assert_eq!(ErrorResponse::default().describe(), None);
    }
}
