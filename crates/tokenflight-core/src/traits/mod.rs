//! Collaborator traits consumed by the coordinator.

mod channel;
mod clock;
mod navigator;
mod random;
mod storage;
mod transport;

pub use channel::{BroadcastChannel, EventStream};
pub use clock::Clock;
pub use navigator::Navigator;
pub use random::{RandomSource, random_hex};
pub use storage::KeyValueStorage;
pub use transport::{RefreshGrant, RefreshRequest, RefreshTransport};
