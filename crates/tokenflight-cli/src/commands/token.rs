//! Token command implementation.

use anyhow::{Result, anyhow};
use clap::Args;
use serde::Serialize;

use tokenflight_core::{AuthError, Error, LogoutReason};

use crate::output;
use crate::state::Workspace;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Refresh endpoint (overrides the one saved at login)
    #[arg(long, env = "TOKENFLIGHT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Print an Authorization header value
    #[arg(long, conflicts_with = "json")]
    pub bearer: bool,

    /// Print the token and its expiry as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct TokenOutput<'a> {
    access_token: &'a str,
    expires_at: Option<i64>,
}

/// Access tokens are held in memory only, so each invocation refreshes once.
pub async fn run(workspace: &Workspace, args: TokenArgs) -> Result<()> {
    let endpoint = workspace.endpoint(args.endpoint.as_deref())?;
    let coordinator = workspace.coordinator(endpoint)?;

    let token = coordinator.get_access_token().await.map_err(explain)?;

    if args.json {
        output::json(&TokenOutput {
            access_token: token.as_str(),
            expires_at: coordinator.expires_at(),
        })?;
    } else if args.bearer {
        println!("{}", token.bearer());
    } else {
        println!("{}", token.as_str());
    }

    Ok(())
}

fn explain(err: Error) -> anyhow::Error {
    match err.as_auth() {
        Some(AuthError::SessionInvalid {
            reason: LogoutReason::NoSession,
        }) => anyhow!("No active session. Run 'tokenflight login' first."),
        Some(AuthError::SessionInvalid { .. }) => {
            anyhow::Error::new(err).context("Session is no longer valid")
        }
        Some(AuthError::RefreshUnavailable { .. }) => {
            anyhow::Error::new(err).context("Could not refresh the access token; session kept")
        }
        None => anyhow::Error::new(err),
    }
}
