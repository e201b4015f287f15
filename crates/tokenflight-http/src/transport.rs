//! reqwest-backed refresh transport.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, instrument, trace, warn};

use tokenflight_core::{
    AccessToken, Clock, Error, InvalidInputError, RefreshFailure, RefreshGrant, RefreshRequest,
    RefreshToken, RefreshTransport,
};

use crate::config::HttpTransportConfig;
use crate::wire::{ErrorResponse, RefreshBody, RefreshResponse};

/// Header carrying the anti-forgery token.
pub const ANTI_FORGERY_HEADER: &str = "X-CSRF-Token";

/// Exchanges refresh tokens by `POST`ing JSON to the configured endpoint.
#[derive(Clone)]
pub struct HttpRefreshTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl HttpRefreshTransport {
    /// Build a transport with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(config: HttpTransportConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| InvalidInputError::Other {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            clock: None,
        })
    }

    /// Compute expiries against `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn now_ms(&self) -> i64 {
        match &self.clock {
            Some(clock) => clock.now_ms(),
            None => Utc::now().timestamp_millis(),
        }
    }

    fn grant_from(&self, body: RefreshResponse) -> Result<RefreshGrant, RefreshFailure> {
        if body.access_token.trim().is_empty() {
            return Err(RefreshFailure::MalformedResponse {
                message: "response carried an empty access token".into(),
            });
        }

        let expires_in_secs = body
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(self.config.default_expires_in.as_secs());
        let expires_in_ms = i64::try_from(expires_in_secs.saturating_mul(1000)).unwrap_or(i64::MAX);

        Ok(RefreshGrant {
            access_token: AccessToken::new(body.access_token),
            refresh_token: body
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(RefreshToken::new),
            expires_at: self.now_ms().saturating_add(expires_in_ms),
        })
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    #[instrument(skip_all, fields(endpoint = %self.config.endpoint))]
    async fn exchange(&self, request: RefreshRequest) -> Result<RefreshGrant, RefreshFailure> {
        debug!("refresh exchange");

        let mut builder = self
            .client
            .post(self.config.endpoint.as_url().clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(&RefreshBody {
                refresh_token: request.refresh_token.as_str(),
            });

        if let Some(token) = &request.anti_forgery_token {
            match HeaderValue::from_str(token.as_str()) {
                Ok(value) => builder = builder.header(ANTI_FORGERY_HEADER, value),
                Err(_) => warn!("anti-forgery token is not a valid header value, omitting it"),
            }
        }

        let response = builder.send().await.map_err(request_failure)?;
        let status = response.status();
        trace!(status = %status, "refresh response");

        let bytes = response.bytes().await.map_err(request_failure)?;

        if !status.is_success() {
            let body = serde_json::from_slice::<ErrorResponse>(&bytes).unwrap_or_default();
            return Err(classify(status, &body));
        }

        let body: RefreshResponse =
            serde_json::from_slice(&bytes).map_err(|e| RefreshFailure::MalformedResponse {
                message: format!("undecodable refresh response: {}", e),
            })?;

        self.grant_from(body)
    }
}

impl std::fmt::Debug for HttpRefreshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRefreshTransport")
            .field("endpoint", &self.config.endpoint.as_str())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

/// Map a non-success status onto the failure taxonomy.
fn classify(status: StatusCode, body: &ErrorResponse) -> RefreshFailure {
    let message = body
        .describe()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RefreshFailure::Unreachable {
                message: format!("{}: {}", status.as_u16(), message),
            }
        }
        s if s.is_client_error() => RefreshFailure::Rejected {
            status: s.as_u16(),
            message,
        },
        s => RefreshFailure::Unreachable {
            message: format!("{}: {}", s.as_u16(), message),
        },
    }
}

fn request_failure(err: reqwest::Error) -> RefreshFailure {
    if err.is_decode() {
        return RefreshFailure::MalformedResponse {
            message: err.to_string(),
        };
    }

    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };
    RefreshFailure::Unreachable { message }
}
