//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{login::LoginArgs, status::StatusArgs, token::TokenArgs, watch::WatchArgs};

/// Session token lifecycle tool.
#[derive(Parser, Debug)]
#[command(name = "tokenflight")]
#[command(author, version = env!("TOKENFLIGHT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Directory holding the shared session state
    #[arg(long, env = "TOKENFLIGHT_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a session issued elsewhere
    Login(LoginArgs),

    /// Print a usable access token, refreshing it if needed
    Token(TokenArgs),

    /// Show the stored session
    Status(StatusArgs),

    /// End the session in every process sharing the state directory
    Logout,

    /// Print session events published by other processes
    Watch(WatchArgs),
}
