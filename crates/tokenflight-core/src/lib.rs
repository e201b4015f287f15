//! tokenflight-core - Core session token types and collaborator traits.

pub mod error;
pub mod event;
pub mod tokens;
pub mod traits;

pub use error::{
    AuthError, Error, InvalidInputError, LogoutReason, RandomUnavailable, RefreshFailure,
    StorageError,
};
pub use event::{EventEnvelope, SessionEvent};
pub use tokens::{AccessToken, AntiForgeryToken, RefreshToken};
pub use traits::{
    BroadcastChannel, Clock, EventStream, KeyValueStorage, Navigator, RandomSource, RefreshGrant,
    RefreshRequest, RefreshTransport, random_hex,
};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
