//! Status command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::output;
use crate::state::Workspace;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusOutput {
    logged_in: bool,
    expires_at: Option<i64>,
    expires_in_secs: u64,
    anti_forgery_token: bool,
    state_dir: String,
}

pub async fn run(workspace: &Workspace, args: StatusArgs) -> Result<()> {
    let coordinator = workspace.coordinator(None)?;

    let status = StatusOutput {
        logged_in: coordinator.has_session(),
        expires_at: coordinator.expires_at(),
        expires_in_secs: coordinator.time_until_expiry().as_secs(),
        anti_forgery_token: coordinator.anti_forgery_token().is_some(),
        state_dir: workspace.dir.root().display().to_string(),
    };

    if args.json {
        return output::json(&status);
    }

    if !status.logged_in {
        println!("{}", "Logged out".dimmed());
        output::field("State", &status.state_dir);
        return Ok(());
    }

    output::field("Session", &"active".green().to_string());
    if let Some(expires_at) = status.expires_at {
        output::field("Expires", &output::timestamp(expires_at));
    }
    let left = match status.expires_in_secs {
        0 => "expired, refreshed on next use".yellow().to_string(),
        secs => output::duration(secs),
    };
    output::field("Time left", &left);
    output::field(
        "Anti-forgery token",
        if status.anti_forgery_token { "present" } else { "missing" },
    );
    output::field("State", &status.state_dir);

    Ok(())
}
