//! Login command implementation.

use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Args;

use tokenflight_core::{AccessToken, RefreshToken};

use crate::output;
use crate::state::Workspace;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Access token issued by the server
    #[arg(long)]
    pub access_token: String,

    /// Refresh token issued by the server
    #[arg(long)]
    pub refresh_token: String,

    /// Access token lifetime in seconds (default 900)
    #[arg(long)]
    pub expires_in: Option<u64>,

    /// Refresh endpoint to remember for later commands
    #[arg(long, env = "TOKENFLIGHT_ENDPOINT")]
    pub endpoint: Option<String>,
}

pub async fn run(workspace: &mut Workspace, args: LoginArgs) -> Result<()> {
    ensure!(!args.access_token.is_empty(), "Access token must not be empty");
    ensure!(!args.refresh_token.is_empty(), "Refresh token must not be empty");

    if let Some(endpoint) = workspace.endpoint(args.endpoint.as_deref())? {
        workspace.settings.endpoint = Some(endpoint);
        workspace.save_settings()?;
    }

    let coordinator = workspace.coordinator(None)?;
    coordinator
        .establish_session(
            AccessToken::new(args.access_token),
            RefreshToken::new(args.refresh_token),
            args.expires_in.map(Duration::from_secs),
        )
        .context("Failed to store session")?;

    output::success("Session stored");
    println!();
    if let Some(expires_at) = coordinator.expires_at() {
        output::field("Expires", &output::timestamp(expires_at));
    }
    if let Some(endpoint) = &workspace.settings.endpoint {
        output::field("Endpoint", endpoint.as_str());
    }
    output::field("State", &workspace.dir.root().display().to_string());

    Ok(())
}
