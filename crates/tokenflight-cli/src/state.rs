//! State directory, remembered settings, and coordinator assembly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use tokenflight::{Coordinator, CoordinatorConfig};
use tokenflight_core::{
    LogoutReason, Navigator, RefreshFailure, RefreshGrant, RefreshRequest, RefreshTransport,
};
use tokenflight_file::{FileChannel, StateDir};
use tokenflight_http::{HttpRefreshTransport, HttpTransportConfig, RefreshEndpoint};

use crate::output;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const SETTINGS_FILE: &str = "settings.json";

/// Settings remembered between invocations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Refresh endpoint saved by `login --endpoint`.
    #[serde(default)]
    pub endpoint: Option<RefreshEndpoint>,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// The state directory of this invocation.
#[derive(Debug)]
pub struct Workspace {
    pub dir: StateDir,
    pub settings: Settings,
}

impl Workspace {
    /// Open `explicit`, or the per-user data directory when not given.
    pub fn open(explicit: Option<&Path>) -> Result<Self> {
        let root = state_root(explicit)?;
        let settings_path = root.join(SETTINGS_FILE);

        let settings = if settings_path.exists() {
            let json = fs::read_to_string(&settings_path).context("Failed to read settings file")?;
            serde_json::from_str(&json).context("Invalid settings file")?
        } else {
            Settings::default()
        };

        Ok(Self {
            dir: StateDir::new(root),
            settings,
        })
    }

    pub fn save_settings(&self) -> Result<()> {
        let path = self.dir.root().join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&path, json).context("Failed to write settings file")?;
        Ok(())
    }

    /// The endpoint given on the command line, else the remembered one.
    pub fn endpoint(&self, flag: Option<&str>) -> Result<Option<RefreshEndpoint>> {
        match flag {
            Some(raw) => Ok(Some(
                RefreshEndpoint::new(raw).context("Invalid refresh endpoint")?,
            )),
            None => Ok(self.settings.endpoint.clone()),
        }
    }

    /// An endpoint on the configured broadcast channel.
    pub fn channel(&self) -> Result<FileChannel> {
        self.dir
            .channel(&self.settings.coordinator.channel_name)
            .context("Failed to open event log")
    }

    /// A coordinator over the file backends. Without an endpoint, refresh
    /// attempts fail as unreachable and the session is kept.
    pub fn coordinator(&self, endpoint: Option<RefreshEndpoint>) -> Result<Coordinator> {
        let transport: Arc<dyn RefreshTransport> = match endpoint {
            Some(endpoint) => {
                let config = HttpTransportConfig::new(endpoint).with_user_agent(concat!(
                    "tokenflight-cli/",
                    env!("CARGO_PKG_VERSION")
                ));
                Arc::new(
                    HttpRefreshTransport::new(config).context("Failed to create HTTP client")?,
                )
            }
            None => Arc::new(NoEndpoint),
        };

        let local = self
            .dir
            .local_storage()
            .context("Failed to open local storage")?;
        let session = self
            .dir
            .session_storage()
            .context("Failed to open session storage")?;
        let channel = self.channel()?;

        Ok(Coordinator::builder(Arc::new(local), transport)
            .session_storage(Arc::new(session))
            .channel(Arc::new(channel))
            .navigator(Arc::new(TerminalNavigator))
            .config(self.settings.coordinator.clone())
            .build())
    }
}

fn state_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let root = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => ProjectDirs::from("", "", "tokenflight")
            .context("Could not determine data directory")?
            .data_dir()
            .to_path_buf(),
    };

    fs::create_dir_all(&root).context("Failed to create state directory")?;

    // Credentials live here.
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&root)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&root, perms)?;
    }

    Ok(root)
}

/// Used when no refresh endpoint is known.
struct NoEndpoint;

#[async_trait]
impl RefreshTransport for NoEndpoint {
    async fn exchange(&self, _request: RefreshRequest) -> Result<RefreshGrant, RefreshFailure> {
        Err(RefreshFailure::Unreachable {
            message: "no refresh endpoint configured (pass --endpoint or set TOKENFLIGHT_ENDPOINT)"
                .into(),
        })
    }
}

/// The terminal's stand-in for a login page.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        if reason == LogoutReason::LoggedOut {
            return;
        }
        output::warning(&format!(
            "Session ended ({}). Run 'tokenflight login' to sign in again.",
            reason
        ));
    }
}
