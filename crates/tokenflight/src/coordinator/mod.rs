//! Single-flight coordinator.
//!
//! One [`Coordinator`] lives in each execution context. It hands out the
//! current access token, and when that token is stale it runs exactly one
//! refresh exchange no matter how many callers are waiting. A rejected
//! refresh tears the whole session down, tells sibling contexts, and asks
//! the navigator to send the user to login, once per teardown.

mod builder;
mod flight;

pub use builder::CoordinatorBuilder;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use tokenflight_core::{
    AccessToken, AntiForgeryToken, AuthError, BroadcastChannel, Clock, KeyValueStorage,
    LogoutReason, Navigator, RandomSource, RefreshFailure, RefreshGrant, RefreshRequest,
    RefreshToken, RefreshTransport, Result, SessionEvent,
};

use crate::config::{CoordinatorConfig, RefreshRotation};
use crate::store::{CredentialStore, RecordUpdate};
use crate::sync::MutexExt;

use flight::{FlightState, HeldAccess, InFlight, Outcome, RefreshHandle, aborted};

type SessionClearedHook = Arc<dyn Fn(LogoutReason) + Send + Sync>;

/// Where a coordinator currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    /// No refresh token is stored.
    LoggedOut,
    /// A session exists and no refresh is running.
    Idle,
    /// One refresh attempt is outstanding.
    Refreshing { generation: u64 },
}

/// Session token coordinator for one execution context.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    store: CredentialStore,
    transport: Arc<dyn RefreshTransport>,
    channel: Arc<dyn BroadcastChannel>,
    navigator: Arc<dyn Navigator>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    state: Mutex<FlightState>,
    hooks: Mutex<Vec<SessionClearedHook>>,
}

enum Acquired {
    Ready(AccessToken),
    Wait(RefreshHandle),
}

impl Coordinator {
    /// Start building a coordinator over origin-wide `storage` that
    /// refreshes through `transport`.
    pub fn builder(
        storage: Arc<dyn KeyValueStorage>,
        transport: Arc<dyn RefreshTransport>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder::new(storage, transport)
    }

    /// Return a usable access token, refreshing it first if needed.
    ///
    /// Concurrent callers share one refresh attempt and all receive the
    /// same token or the same error.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionInvalid`] if no session exists, the refresh
    ///   was rejected, or the session ended while the refresh was running;
    ///   the session has been cleared.
    /// - [`AuthError::RefreshUnavailable`] on transient failure; the session
    ///   is intact and the caller may retry.
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Result<AccessToken> {
        match self.inner.acquire()? {
            Acquired::Ready(token) => Ok(token),
            Acquired::Wait(handle) => Ok(handle.await?),
        }
    }

    /// Install a freshly issued session.
    ///
    /// The access token is held in memory; the refresh token and expiry are
    /// persisted. An anti-forgery token is generated if none exists. Any
    /// refresh still in flight is superseded.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Random`](tokenflight_core::Error::Random) if an
    /// anti-forgery token is needed and no secure generator is available,
    /// or with a storage error if the record cannot be written.
    #[instrument(skip_all)]
    pub fn establish_session(
        &self,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let inner = &self.inner;
        let lifetime = expires_in
            .filter(|d| !d.is_zero())
            .unwrap_or(inner.config.default_expires_in);
        let expires_at = inner.clock.now_ms() + duration_ms(lifetime);

        let mut state = inner.state.lock_or_recover();
        inner
            .store
            .ensure_anti_forgery_token(inner.random.as_ref(), inner.config.anti_forgery_bytes)?;
        inner.store.write(RecordUpdate {
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
            ..Default::default()
        })?;

        let generation = state.supersede();
        state.access = Some(HeldAccess {
            token: access_token,
            expires_at,
        });
        state.session_active = true;

        info!(generation, expires_at, "session established");
        Ok(())
    }

    /// End the session: clear storage, tell other contexts, and request a
    /// redirect to login.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        self.inner.teardown(LogoutReason::LoggedOut);
    }

    /// Register a callback run whenever this context drops its session,
    /// whether the teardown happened here or in another context.
    pub fn on_session_cleared<F>(&self, hook: F)
    where
        F: Fn(LogoutReason) + Send + Sync + 'static,
    {
        self.inner.hooks.lock_or_recover().push(Arc::new(hook));
    }

    /// Apply an event received from another context.
    pub fn handle_remote_event(&self, event: &SessionEvent) {
        self.inner.handle_remote_event(event);
    }

    /// Feed events from the broadcast channel into this coordinator.
    ///
    /// Returns `None` when the channel has no subscribe capability. The
    /// task ends once every clone of the coordinator is dropped.
    pub fn spawn_listener(&self) -> Option<JoinHandle<()>> {
        let mut events = self.inner.channel.subscribe()?;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_remote_event(&event);
            }
            debug!("broadcast listener stopped");
        }))
    }

    /// The stored anti-forgery token, if any.
    pub fn anti_forgery_token(&self) -> Option<AntiForgeryToken> {
        self.inner.store.anti_forgery_token()
    }

    /// The anti-forgery token, generated now if missing.
    pub fn ensure_anti_forgery_token(&self) -> Result<AntiForgeryToken> {
        let inner = &self.inner;
        let _state = inner.state.lock_or_recover();
        inner
            .store
            .ensure_anti_forgery_token(inner.random.as_ref(), inner.config.anti_forgery_bytes)
    }

    /// True while a refresh token is stored.
    pub fn has_session(&self) -> bool {
        !self.inner.store.read().is_logged_out()
    }

    /// Expiry of the access token in epoch milliseconds.
    pub fn expires_at(&self) -> Option<i64> {
        let held = self
            .inner
            .state
            .lock_or_recover()
            .access
            .as_ref()
            .map(|a| a.expires_at);
        held.or_else(|| self.inner.store.read().expires_at)
    }

    /// Time left before the access token expires, zero once it has.
    pub fn time_until_expiry(&self) -> Duration {
        let Some(expires_at) = self.expires_at() else {
            return Duration::ZERO;
        };
        let remaining = expires_at - self.inner.clock.now_ms();
        Duration::from_millis(remaining.max(0) as u64)
    }

    pub fn phase(&self) -> FlightPhase {
        let state = self.inner.state.lock_or_recover();
        if let Some(flight) = &state.in_flight {
            return FlightPhase::Refreshing {
                generation: flight.generation,
            };
        }
        if self.inner.store.read().is_logged_out() {
            FlightPhase::LoggedOut
        } else {
            FlightPhase::Idle
        }
    }

    /// The persisted half of the session.
    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("phase", &self.phase())
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

impl Inner {
    fn acquire(self: &Arc<Self>) -> std::result::Result<Acquired, AuthError> {
        let record = self.store.read();

        let Some(refresh_token) = record.refresh_token else {
            self.forget_vanished_session();
            debug!("no refresh token stored");
            return Err(AuthError::session_invalid(LogoutReason::NoSession));
        };

        let now = self.clock.now_ms();
        let margin = duration_ms(self.config.safety_margin);
        let mut state = self.state.lock_or_recover();
        state.session_active = true;

        if let Some(held) = &state.access
            && held.is_fresh(now, margin)
        {
            return Ok(Acquired::Ready(held.token.clone()));
        }

        if let Some(flight) = &state.in_flight {
            debug!(generation = flight.generation, "joining in-flight refresh");
            return Ok(Acquired::Wait(flight.handle.clone()));
        }

        state.generation += 1;
        let generation = state.generation;
        let request = RefreshRequest {
            refresh_token,
            anti_forgery_token: record.anti_forgery_token,
        };
        let (abort, abort_rx) = watch::channel(None);
        let handle = run_refresh(
            Arc::downgrade(self),
            Arc::clone(&self.transport),
            generation,
            request,
            abort_rx,
        )
        .instrument(info_span!("refresh", generation))
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            generation,
            handle: handle.clone(),
            abort,
        });
        Ok(Acquired::Wait(handle))
    }

    fn settle(
        &self,
        generation: u64,
        used: &RefreshToken,
        result: std::result::Result<RefreshGrant, RefreshFailure>,
    ) -> Outcome {
        match result {
            Ok(grant) => self.apply_grant(generation, used, grant),
            Err(failure) if failure.is_terminal() => {
                self.fail_terminal(generation, used, failure)
            }
            Err(failure) => {
                self.state.lock_or_recover().release(generation);
                warn!(error = %failure, "refresh failed, session kept");
                Err(AuthError::refresh_unavailable(failure.to_string()))
            }
        }
    }

    fn apply_grant(&self, generation: u64, used: &RefreshToken, grant: RefreshGrant) -> Outcome {
        let expires_at = grant.expires_at;
        {
            let mut state = self.state.lock_or_recover();
            if !state.is_current(generation) {
                info!(current = state.generation, "discarding superseded refresh result");
                return Err(superseded());
            }

            // Storage is shared with sibling contexts, which may have ended
            // or rotated the session while this exchange was on the wire.
            match self.store.read().refresh_token {
                None => {
                    let was_active = std::mem::take(&mut state.session_active);
                    state.supersede();
                    drop(state);
                    info!("session cleared elsewhere during refresh, result discarded");
                    if was_active {
                        self.announce_vanished();
                    }
                    return Err(AuthError::session_invalid(LogoutReason::ClearedElsewhere));
                }
                Some(stored) if stored != *used => {
                    state.access = Some(HeldAccess {
                        token: grant.access_token.clone(),
                        expires_at,
                    });
                    state.release(generation);
                    info!("refresh credential rotated elsewhere, storage left as is");
                    return Ok(grant.access_token);
                }
                Some(_) => {}
            }

            // Memory first so local callers never wait on storage.
            state.access = Some(HeldAccess {
                token: grant.access_token.clone(),
                expires_at,
            });

            let refresh_token = match self.config.rotation {
                RefreshRotation::FollowResponse => grant.refresh_token,
                RefreshRotation::KeepExisting => None,
            };
            if let Err(e) = self.store.write(RecordUpdate {
                refresh_token,
                expires_at: Some(expires_at),
                ..Default::default()
            }) {
                state.access = None;
                state.release(generation);
                warn!(error = %e, "failed to persist refreshed credentials");
                return Err(AuthError::refresh_unavailable(format!(
                    "refreshed credentials could not be stored: {}",
                    e
                )));
            }

            state.release(generation);
        }

        self.channel
            .publish(&SessionEvent::RefreshCompleted { expires_at });
        info!(expires_at, "refresh completed");
        Ok(grant.access_token)
    }

    fn fail_terminal(
        &self,
        generation: u64,
        used: &RefreshToken,
        failure: RefreshFailure,
    ) -> Outcome {
        let reason = failure
            .logout_reason()
            .unwrap_or(LogoutReason::RefreshRejected);
        {
            let mut state = self.state.lock_or_recover();
            if !state.is_current(generation) {
                info!(current = state.generation, "discarding superseded refresh failure");
                return Err(superseded());
            }

            // Another context may have rotated the credential while this
            // attempt was on the wire; the rejection then says nothing about
            // the session stored now.
            let stored = self.store.read().refresh_token;
            if stored.as_ref().is_some_and(|current| current != used) {
                state.release(generation);
                warn!(error = %failure, "refresh rejected for a credential rotated elsewhere");
                return Err(AuthError::refresh_unavailable(
                    "refresh credential was rotated by another context",
                ));
            }

            state.supersede();
            state.session_active = false;
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "session teardown left storage dirty");
            }
        }

        warn!(error = %failure, %reason, "refresh failed, session cleared");
        self.announce_teardown(reason);
        Err(AuthError::session_invalid(reason))
    }

    fn teardown(&self, reason: LogoutReason) {
        {
            let mut state = self.state.lock_or_recover();
            state.abort(reason);
            state.session_active = false;
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "session teardown left storage dirty");
            }
        }
        info!(%reason, "session cleared");
        self.announce_teardown(reason);
    }

    fn announce_teardown(&self, reason: LogoutReason) {
        self.channel
            .publish(&SessionEvent::SessionCleared { reason });
        self.run_hooks(reason);
        self.navigator.redirect_to_login(reason);
    }

    fn handle_remote_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SessionCleared { reason } => {
                let was_active = {
                    let mut state = self.state.lock_or_recover();
                    state.abort(LogoutReason::ClearedElsewhere);
                    std::mem::take(&mut state.session_active)
                };
                info!(remote_reason = %reason, "session cleared by another context");
                self.run_hooks(LogoutReason::ClearedElsewhere);
                if was_active {
                    self.navigator
                        .redirect_to_login(LogoutReason::ClearedElsewhere);
                }
            }
            SessionEvent::RefreshCompleted { expires_at } => {
                if self.store.read().is_logged_out() {
                    self.forget_vanished_session();
                } else {
                    debug!(expires_at, "another context refreshed, storage re-checked");
                }
            }
        }
    }

    /// Storage says logged out but this context still thinks otherwise,
    /// e.g. a teardown broadcast never arrived. Catch up once.
    fn forget_vanished_session(&self) {
        {
            let mut state = self.state.lock_or_recover();
            state.abort(LogoutReason::ClearedElsewhere);
            if !std::mem::take(&mut state.session_active) {
                return;
            }
        }
        info!("session disappeared from storage");
        self.announce_vanished();
    }

    fn announce_vanished(&self) {
        self.run_hooks(LogoutReason::ClearedElsewhere);
        self.navigator
            .redirect_to_login(LogoutReason::ClearedElsewhere);
    }

    fn run_hooks(&self, reason: LogoutReason) {
        let hooks = self.hooks.lock_or_recover().clone();
        for hook in hooks {
            hook(reason);
        }
    }
}

async fn run_refresh(
    inner: Weak<Inner>,
    transport: Arc<dyn RefreshTransport>,
    generation: u64,
    request: RefreshRequest,
    abort: watch::Receiver<Option<LogoutReason>>,
) -> Outcome {
    let used = request.refresh_token.clone();
    info!("refresh started");

    tokio::select! {
        biased;

        reason = aborted(abort) => {
            info!(%reason, "session ended during refresh");
            Err(AuthError::session_invalid(reason))
        }
        result = transport.exchange(request) => match inner.upgrade() {
            Some(inner) => inner.settle(generation, &used, result),
            None => Err(AuthError::refresh_unavailable("coordinator dropped")),
        },
    }
}

fn superseded() -> AuthError {
    AuthError::refresh_unavailable("refresh superseded by a newer session state")
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
