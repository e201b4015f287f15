//! Logout command implementation.

use anyhow::Result;

use crate::output;
use crate::state::Workspace;

pub async fn run(workspace: &Workspace) -> Result<()> {
    let coordinator = workspace.coordinator(None)?;
    let had_session = coordinator.has_session();

    coordinator.logout();

    if had_session {
        output::success("Logged out");
    } else {
        output::success("No active session; storage cleared");
    }
    Ok(())
}
