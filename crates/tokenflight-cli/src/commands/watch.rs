//! Watch command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures_util::StreamExt;

use tokenflight_core::{BroadcastChannel, SessionEvent};

use crate::output;
use crate::state::Workspace;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Output events as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(workspace: &Workspace, args: WatchArgs) -> Result<()> {
    let channel = workspace.channel()?;
    let mut events = channel
        .subscribe()
        .context("Event subscription unavailable")?;

    eprintln!("{}", "Watching session events...".dimmed());
    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());
    eprintln!();

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => print_event(&event, args.json)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn print_event(event: &SessionEvent, json: bool) -> Result<()> {
    if json {
        return output::json(event);
    }

    match event {
        SessionEvent::RefreshCompleted { expires_at } => println!(
            "{} expires {}",
            "REFRESHED".green(),
            output::timestamp(*expires_at)
        ),
        SessionEvent::SessionCleared { reason } => {
            println!("{} {}", "CLEARED".red(), reason)
        }
    }
    Ok(())
}
