//! Cross-context broadcast trait.

use std::pin::Pin;

use futures_core::Stream;

use crate::event::SessionEvent;

/// Stream of events published by other execution contexts.
pub type EventStream = Pin<Box<dyn Stream<Item = SessionEvent> + Send>>;

/// Best-effort publish/subscribe channel shared by contexts of one origin.
///
/// Delivery is unordered and may silently drop messages. A context never
/// receives the events it published itself.
pub trait BroadcastChannel: Send + Sync {
    /// Fire-and-forget publish.
    fn publish(&self, event: &SessionEvent);

    /// Subscribe to events from other contexts.
    ///
    /// Returns `None` when the capability is absent.
    fn subscribe(&self) -> Option<EventStream>;
}
