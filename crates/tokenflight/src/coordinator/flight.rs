//! In-memory refresh state for one execution context.

use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;

use tokenflight_core::{AccessToken, AuthError, LogoutReason};

/// What every waiter on one refresh attempt receives.
pub(crate) type Outcome = Result<AccessToken, AuthError>;

/// The single awaitable shared by all callers of one attempt.
pub(crate) type RefreshHandle = Shared<BoxFuture<'static, Outcome>>;

/// An access token together with the expiry it was issued with.
#[derive(Debug, Clone)]
pub(crate) struct HeldAccess {
    pub token: AccessToken,
    pub expires_at: i64,
}

impl HeldAccess {
    pub fn is_fresh(&self, now_ms: i64, margin_ms: i64) -> bool {
        now_ms < self.expires_at.saturating_sub(margin_ms)
    }
}

pub(crate) struct InFlight {
    pub generation: u64,
    pub handle: RefreshHandle,
    /// Set when the session ends under the attempt.
    pub abort: watch::Sender<Option<LogoutReason>>,
}

/// Resolves once the attempt is aborted. Never resolves if the attempt is
/// only superseded, so its waiters keep awaiting the exchange.
pub(crate) async fn aborted(mut rx: watch::Receiver<Option<LogoutReason>>) -> LogoutReason {
    let reason = match rx.wait_for(Option::is_some).await {
        Ok(reason) => *reason,
        Err(_) => None,
    };
    match reason {
        Some(reason) => reason,
        None => std::future::pending().await,
    }
}

/// Coordinator state guarded by one mutex.
///
/// Store mutations happen while this lock is held, so a superseded attempt
/// can never write over the state of a newer one.
#[derive(Default)]
pub(crate) struct FlightState {
    pub access: Option<HeldAccess>,
    pub in_flight: Option<InFlight>,
    /// Incremented whenever an attempt starts or the session is replaced.
    pub generation: u64,
    /// This context has seen a live session since its last teardown.
    pub session_active: bool,
}

impl FlightState {
    /// Start a new generation and drop the current handle and access token.
    /// Results from older attempts are ignored from here on.
    pub fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.in_flight = None;
        self.access = None;
        self.generation
    }

    /// The session ended: fail every waiter on the current attempt with
    /// `reason`, then supersede it.
    pub fn abort(&mut self, reason: LogoutReason) -> u64 {
        if let Some(flight) = &self.in_flight {
            flight.abort.send_replace(Some(reason));
        }
        self.supersede()
    }

    /// Drop the handle if it still belongs to `generation`.
    pub fn release(&mut self, generation: u64) -> bool {
        if self.generation == generation {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
