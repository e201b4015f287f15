//! Broadcast channel implementations.
//!
//! [`NoopChannel`] stands in where no cross-context capability exists.
//! [`LocalHub`] connects coordinators living in one process, each through
//! its own [`LocalChannel`] endpoint on a named channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::{StreamExt, future};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};
use uuid::Uuid;

use tokenflight_core::{BroadcastChannel, EventEnvelope, EventStream, SessionEvent};

use crate::sync::MutexExt;

const HUB_CAPACITY: usize = 64;

/// Publishes nowhere and never delivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChannel;

impl BroadcastChannel for NoopChannel {
    fn publish(&self, event: &SessionEvent) {
        trace!(kind = event.kind(), "broadcast unavailable, dropping event");
    }

    fn subscribe(&self) -> Option<EventStream> {
        None
    }
}

/// In-process fan-out. Endpoints only hear others on the same channel name.
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<EventEnvelope>>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new endpoint on channel `name` with its own context id.
    pub fn endpoint(&self, name: &str) -> LocalChannel {
        let tx = self
            .channels
            .lock_or_recover()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(HUB_CAPACITY).0)
            .clone();

        LocalChannel {
            id: Uuid::new_v4().to_string(),
            tx,
        }
    }
}

/// One context's view of a [`LocalHub`].
#[derive(Debug, Clone)]
pub struct LocalChannel {
    id: String,
    tx: broadcast::Sender<EventEnvelope>,
}

impl LocalChannel {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl BroadcastChannel for LocalChannel {
    fn publish(&self, event: &SessionEvent) {
        let envelope = EventEnvelope {
            source: self.id.clone(),
            time: Utc::now().to_rfc3339(),
            event: event.clone(),
        };
        if self.tx.send(envelope).is_err() {
            trace!(kind = event.kind(), "no subscribers on hub");
        }
    }

    fn subscribe(&self) -> Option<EventStream> {
        let id = self.id.clone();
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| {
            future::ready(match item {
                Ok(envelope) if envelope.source != id => Some(envelope.event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(skipped = n, "broadcast subscriber lagged");
                    None
                }
            })
        });
        Some(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflight_core::LogoutReason;

    #[tokio::test]
    async fn endpoints_do_not_hear_themselves() {
        let hub = LocalHub::new();
        let a = hub.endpoint("auth_events");
        let b = hub.endpoint("auth_events");

        let mut a_events = a.subscribe().unwrap();
        let mut b_events = b.subscribe().unwrap();

        a.publish(&SessionEvent::RefreshCompleted { expires_at: 10 });
        b.publish(&SessionEvent::SessionCleared {
            reason: LogoutReason::LoggedOut,
        });

        assert_eq!(
            b_events.next().await,
            Some(SessionEvent::RefreshCompleted { expires_at: 10 })
        );
        assert_eq!(
            a_events.next().await,
            Some(SessionEvent::SessionCleared {
                reason: LogoutReason::LoggedOut
            })
        );
    }

    #[tokio::test]
    async fn channel_names_are_isolated() {
        let hub = LocalHub::new();
        let auth = hub.endpoint("auth_events");
        let other = hub.endpoint("billing_events");
        let mut auth_events = auth.subscribe().unwrap();
        let mut other_events = other.subscribe().unwrap();

        other.publish(&SessionEvent::RefreshCompleted { expires_at: 1 });
        hub.endpoint("auth_events")
            .publish(&SessionEvent::RefreshCompleted { expires_at: 2 });

        assert_eq!(
            auth_events.next().await,
            Some(SessionEvent::RefreshCompleted { expires_at: 2 })
        );
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), other_events.next())
                .await
                .is_err()
        );
    }

    #[test]
    fn noop_has_no_subscription() {
        assert!(NoopChannel.subscribe().is_none());
        NoopChannel.publish(&SessionEvent::RefreshCompleted { expires_at: 0 });
    }
}
