//! Refresh transport trait.

use async_trait::async_trait;

use crate::error::RefreshFailure;
use crate::tokens::{AccessToken, AntiForgeryToken, RefreshToken};

/// Input to one refresh exchange.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    /// The current refresh credential.
    pub refresh_token: RefreshToken,
    /// Anti-forgery token to bind to the request, if one exists.
    pub anti_forgery_token: Option<AntiForgeryToken>,
}

/// Successful result of a refresh exchange.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    /// The new access credential.
    pub access_token: AccessToken,
    /// A rotated refresh credential, if the server issued one.
    pub refresh_token: Option<RefreshToken>,
    /// Epoch milliseconds at which the access credential goes stale.
    pub expires_at: i64,
}

/// Performs the network exchange trading a refresh credential for a new
/// access credential.
///
/// Implementations must carry their own timeout and report it as
/// [`RefreshFailure::Unreachable`]; a call that never resolves would block
/// every caller in the context.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn exchange(&self, request: RefreshRequest) -> Result<RefreshGrant, RefreshFailure>;
}
