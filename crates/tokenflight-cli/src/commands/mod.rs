//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod status;
pub mod token;
pub mod watch;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::state::Workspace;

pub async fn handle(cli: Cli) -> Result<()> {
    let mut workspace = Workspace::open(cli.state_dir.as_deref())?;

    match cli.command {
        Commands::Login(args) => login::run(&mut workspace, args).await,
        Commands::Token(args) => token::run(&workspace, args).await,
        Commands::Status(args) => status::run(&workspace, args).await,
        Commands::Logout => logout::run(&workspace).await,
        Commands::Watch(args) => watch::run(&workspace, args).await,
    }
}
