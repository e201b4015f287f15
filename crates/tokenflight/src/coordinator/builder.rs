//! Coordinator construction.

use std::sync::{Arc, Mutex};

use tokenflight_core::{BroadcastChannel, Clock, KeyValueStorage, Navigator, RandomSource, RefreshTransport};

use crate::channel::NoopChannel;
use crate::clock::SystemClock;
use crate::config::CoordinatorConfig;
use crate::navigator::LoggingNavigator;
use crate::random::OsRandom;
use crate::store::{CredentialStore, MemoryStorage};

use super::flight::FlightState;
use super::{Coordinator, Inner};

/// Builder for a [`Coordinator`].
///
/// Only the origin-wide storage and the transport are required. The rest
/// default to: a fresh in-memory session partition, no broadcast, a
/// logging navigator, the OS random source, and the system clock.
pub struct CoordinatorBuilder {
    local: Arc<dyn KeyValueStorage>,
    session: Option<Arc<dyn KeyValueStorage>>,
    transport: Arc<dyn RefreshTransport>,
    channel: Arc<dyn BroadcastChannel>,
    navigator: Arc<dyn Navigator>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    pub(crate) fn new(
        local: Arc<dyn KeyValueStorage>,
        transport: Arc<dyn RefreshTransport>,
    ) -> Self {
        Self {
            local,
            session: None,
            transport,
            channel: Arc::new(NoopChannel),
            navigator: Arc::new(LoggingNavigator),
            random: Arc::new(OsRandom),
            clock: Arc::new(SystemClock),
            config: CoordinatorConfig::default(),
        }
    }

    /// Partition holding the anti-forgery token.
    pub fn session_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.session = Some(storage);
        self
    }

    pub fn channel(mut self, channel: Arc<dyn BroadcastChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Coordinator {
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let store = CredentialStore::new(self.local, session, self.config.storage_keys.clone());

        Coordinator {
            inner: Arc::new(Inner {
                store,
                transport: self.transport,
                channel: self.channel,
                navigator: self.navigator,
                random: self.random,
                clock: self.clock,
                config: self.config,
                state: Mutex::new(FlightState::default()),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }
}
