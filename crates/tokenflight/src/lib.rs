//! tokenflight - Session token lifecycle coordinator.
//!
//! This library holds a short-lived access credential and a longer-lived
//! refresh credential, renews the access credential on demand, and collapses
//! concurrent renewals into a single network exchange. All callers go
//! through a [`Coordinator`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokenflight::{Coordinator, MemoryStorage};
//! # use tokenflight_core::{RefreshTransport, RefreshRequest, RefreshGrant, RefreshFailure};
//! # struct Transport;
//! # #[async_trait::async_trait]
//! # impl RefreshTransport for Transport {
//! #     async fn exchange(&self, _: RefreshRequest) -> Result<RefreshGrant, RefreshFailure> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn example() -> Result<(), tokenflight::Error> {
//! let coordinator = Coordinator::builder(Arc::new(MemoryStorage::new()), Arc::new(Transport))
//!     .build();
//!
//! let token = coordinator.get_access_token().await?;
//! println!("Authorization: {}", token.bearer());
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod navigator;
pub mod random;
pub mod store;
mod sync;

pub use channel::{LocalChannel, LocalHub, NoopChannel};
pub use clock::{ManualClock, SystemClock};
pub use config::{CoordinatorConfig, RefreshRotation, StorageKeys};
pub use coordinator::{Coordinator, CoordinatorBuilder, FlightPhase};
pub use navigator::{LoggingNavigator, RecordingNavigator};
pub use random::OsRandom;
#[cfg(any(test, feature = "test-util"))]
pub use random::SeededRandom;
pub use store::{CredentialStore, MemoryStorage, RecordUpdate, SessionRecord};

pub use tokenflight_core::{
    AccessToken, AntiForgeryToken, AuthError, Error, LogoutReason, RefreshFailure, RefreshToken,
    Result, SessionEvent,
};
