//! Shared fixtures for coordinator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use tokenflight::{
    Coordinator, CoordinatorConfig, ManualClock, MemoryStorage, RecordingNavigator,
};
use tokenflight_core::{
    AccessToken, BroadcastChannel, KeyValueStorage, RefreshFailure, RefreshGrant, RefreshRequest,
    RefreshToken, RefreshTransport, StorageError,
};

/// Fixed "now" for every test, in epoch milliseconds.
pub const NOW: i64 = 1_700_000_000_000;

/// Transport that replays scripted results, optionally holding each call
/// until the test releases it.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RefreshGrant, RefreshFailure>>>,
    requests: Mutex<Vec<RefreshRequest>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Every call blocks until [`ScriptedTransport::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn push_ok(&self, access: &str, refresh: Option<&str>, expires_at: i64) {
        self.responses.lock().unwrap().push_back(Ok(RefreshGrant {
            access_token: AccessToken::new(access),
            refresh_token: refresh.map(RefreshToken::new),
            expires_at,
        }));
    }

    pub fn push_err(&self, failure: RefreshFailure) {
        self.responses.lock().unwrap().push_back(Err(failure));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RefreshTransport for ScriptedTransport {
    async fn exchange(&self, request: RefreshRequest) -> Result<RefreshGrant, RefreshFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RefreshFailure::Unreachable {
                    message: "no scripted response".into(),
                })
            })
    }
}

/// Storage whose writes can be switched to fail, like a full disk.
#[derive(Default)]
pub struct FailingStorage {
    pub inner: MemoryStorage,
    failing: AtomicBool,
}

impl FailingStorage {
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("disk full"))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStorage for FailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.remove(key)
    }
}

pub fn rejected() -> RefreshFailure {
    RefreshFailure::Rejected {
        status: 401,
        message: "refresh token revoked".into(),
    }
}

pub fn unreachable() -> RefreshFailure {
    RefreshFailure::Unreachable {
        message: "request timed out".into(),
    }
}

/// One execution context with recording collaborators.
pub struct Context {
    pub coordinator: Coordinator,
    pub transport: Arc<ScriptedTransport>,
    pub local: MemoryStorage,
    pub session: MemoryStorage,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<ManualClock>,
}

impl Context {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self::build(transport, MemoryStorage::new(), None, CoordinatorConfig::default())
    }

    pub fn with_config(transport: ScriptedTransport, config: CoordinatorConfig) -> Self {
        Self::build(transport, MemoryStorage::new(), None, config)
    }

    /// A context sharing `local` storage with its siblings.
    pub fn sibling(
        transport: ScriptedTransport,
        local: MemoryStorage,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Self {
        Self::build(transport, local, Some(channel), CoordinatorConfig::default())
    }

    fn build(
        transport: ScriptedTransport,
        local: MemoryStorage,
        channel: Option<Arc<dyn BroadcastChannel>>,
        config: CoordinatorConfig,
    ) -> Self {
        let transport = Arc::new(transport);
        let session = MemoryStorage::new();
        let navigator = Arc::new(RecordingNavigator::new());
        let clock = Arc::new(ManualClock::new(NOW));

        let mut builder = Coordinator::builder(Arc::new(local.clone()), transport.clone())
            .session_storage(Arc::new(session.clone()))
            .navigator(navigator.clone())
            .clock(clock.clone())
            .config(config);
        if let Some(channel) = channel {
            builder = builder.channel(channel);
        }

        Self {
            coordinator: builder.build(),
            transport,
            local,
            session,
            navigator,
            clock,
        }
    }

    /// Persist a session as a previous page load would have left it.
    pub fn seed_session(&self, refresh: &str, expires_at: i64) {
        self.local.set("refresh_token", refresh).unwrap();
        self.local
            .set("token_expires_at", &expires_at.to_string())
            .unwrap();
        self.session.set("csrf_token", "csrf-1").unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.local.get(key).unwrap()
    }
}

/// Yield until the transport has been called `n` times.
pub async fn wait_for_calls(transport: &ScriptedTransport, n: usize) {
    for _ in 0..10_000 {
        if transport.calls() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("transport saw {} calls, expected {}", transport.calls(), n);
}
