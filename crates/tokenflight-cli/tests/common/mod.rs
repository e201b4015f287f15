#![allow(dead_code)]

use std::path::Path;
use std::process::{Child, Command, Output, Stdio};

/// A command for the CLI binary, isolated to `state`.
pub fn cli(state: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tokenflight"));
    cmd.env("TOKENFLIGHT_STATE_DIR", state);
    cmd.env_remove("TOKENFLIGHT_ENDPOINT");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Run the CLI with arguments.
pub fn run_cli(state: &Path, args: &[&str]) -> Output {
    cli(state)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

/// Run the CLI and expect success.
pub fn run_cli_success(state: &Path, args: &[&str]) -> String {
    let output = run_cli(state, args);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Start the CLI in the background with piped stdout.
pub fn spawn_cli(state: &Path, args: &[&str]) -> Child {
    cli(state)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn CLI")
}

/// Store a session with the given refresh token.
pub fn login(state: &Path, refresh: &str, extra: &[&str]) {
    let mut args = vec![
        "login",
        "--access-token",
        "initial-access",
        "--refresh-token",
        refresh,
    ];
    args.extend_from_slice(extra);
    run_cli_success(state, &args);
}

/// Parse the partition file written by the file backend.
pub fn partition(state: &Path, name: &str) -> serde_json::Value {
    let path = state.join(format!("{}.json", name));
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).expect("partition is JSON"),
        Err(_) => serde_json::json!({}),
    }
}
