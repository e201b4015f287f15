//! tokenflight-http - Refresh transport over HTTP.
//!
//! [`HttpRefreshTransport`] posts the refresh credential to a token
//! endpoint and maps the response onto the transport failure taxonomy:
//! client errors reject the session, server errors and timeouts leave it
//! intact.

mod config;
mod endpoint;
mod transport;
mod wire;

pub use config::HttpTransportConfig;
pub use endpoint::RefreshEndpoint;
pub use transport::{ANTI_FORGERY_HEADER, HttpRefreshTransport};
