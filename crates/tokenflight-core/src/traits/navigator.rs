//! Redirect collaborator trait.

use crate::error::LogoutReason;

/// Navigates the user to the login surface.
///
/// The coordinator calls this at most once per teardown; it never performs
/// navigation itself.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, reason: LogoutReason);
}
