//! Navigator implementations.

use std::sync::Mutex;

use tokenflight_core::{LogoutReason, Navigator};
use tracing::warn;

use crate::sync::MutexExt;

/// Logs the redirect request. Useful where no UI layer is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        warn!(%reason, "session ended, login required");
    }
}

/// Records every redirect request.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<LogoutReason>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<LogoutReason> {
        self.redirects.lock_or_recover().clone()
    }

    pub fn count(&self) -> usize {
        self.redirects.lock_or_recover().len()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        self.redirects.lock_or_recover().push(reason);
    }
}
