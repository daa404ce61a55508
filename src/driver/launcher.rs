//! Driver launchers.
//!
//! A [`Launcher`] produces a fresh, exclusively owned [`Driver`] per call.
//! The sequential runner launches once; the concurrent runner launches
//! once per query.
//!
//! | Launcher | Backend |
//! |----------|---------|
//! | [`FirefoxLauncher`] | Local Firefox with its built-in BiDi remote agent |
//! | [`RemoteLauncher`] | Any existing BiDi WebSocket endpoint |

// ============================================================================
// Imports
// ============================================================================

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::{BrowserKind, RunConfiguration};
use crate::error::{Error, Result};

use super::bidi::{BidiDriver, Connection};
use super::core::Driver;
use super::options::BrowserOptions;
use super::profile::Profile;

// ============================================================================
// Constants
// ============================================================================

/// How long a spawned browser gets to bring its remote agent up.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Binary looked up on `PATH` when none is configured.
const DEFAULT_FIREFOX_BINARY: &str = "firefox";

// ============================================================================
// Launcher
// ============================================================================

/// Factory for independent driver instances.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launches or connects a new browser and returns its driver.
    async fn launch(&self) -> Result<Box<dyn Driver>>;
}

/// Picks the launcher for the configured backend.
///
/// # Errors
///
/// Returns an error if backend-specific settings are missing or invalid.
pub fn launcher_for(config: &RunConfiguration) -> Result<Arc<dyn Launcher>> {
    let options = config.browser_options();
    options.validate().map_err(Error::config)?;

    match config.browser {
        BrowserKind::Firefox => Ok(Arc::new(FirefoxLauncher::new(
            config.firefox_binary.clone(),
            options,
        )?)),
        BrowserKind::Remote => {
            let url = config.remote_url.clone().ok_or_else(|| {
                Error::config("browser `remote` requires `remote_url`")
            })?;
            Ok(Arc::new(RemoteLauncher::new(url, options)))
        }
    }
}

// ============================================================================
// ProcessGuard
// ============================================================================

/// Guards a child process and ensures it is killed when dropped.
pub(crate) struct ProcessGuard {
    child: Option<Child>,
    pid: u32,
}

impl ProcessGuard {
    fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Process guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Kills the process and waits for it to exit.
    pub(crate) async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(pid = self.pid, "Killing browser process");
            if let Err(e) = child.kill().await {
                debug!(pid = self.pid, error = %e, "Failed to kill process");
            }
            info!(pid = self.pid, "Process terminated");
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// FirefoxLauncher
// ============================================================================

/// Spawns a local Firefox per launch, each with its own temporary profile.
#[derive(Debug, Clone)]
pub struct FirefoxLauncher {
    binary: PathBuf,
    options: BrowserOptions,
}

impl FirefoxLauncher {
    /// Creates a launcher for `binary`, or `firefox` on `PATH` when `None`.
    ///
    /// # Errors
    ///
    /// [`Error::BrowserNotFound`] if an explicit binary path does not exist.
    pub fn new(binary: Option<PathBuf>, options: BrowserOptions) -> Result<Self> {
        let binary = match binary {
            Some(path) if !path.exists() => return Err(Error::browser_not_found(path)),
            Some(path) => path,
            None => PathBuf::from(DEFAULT_FIREFOX_BINARY),
        };
        Ok(Self { binary, options })
    }

    fn spawn(&self, profile: &Profile, port: u16) -> Result<Child> {
        let mut cmd = Command::new(&self.binary);

        cmd.arg("--profile")
            .arg(profile.path())
            .arg("--no-remote")
            .arg("--new-instance")
            .args(self.options.to_args(port));

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        cmd.spawn().map_err(Error::process_launch_failed)
    }
}

#[async_trait]
impl Launcher for FirefoxLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        let profile = Profile::new_temp()?;
        profile.write_prefs(&Profile::automation_prefs())?;

        let port = free_port()?;
        let child = self.spawn(&profile, port)?;
        let guard = ProcessGuard::new(child);
        info!(pid = guard.pid, port, headless = self.options.headless, "Firefox process spawned");

        let url = format!("ws://127.0.0.1:{port}/session");
        let connection = Connection::connect(&url, LAUNCH_TIMEOUT).await?;

        let driver = BidiDriver::start(
            connection,
            self.options.window_size,
            Some(guard),
            Some(profile),
        )
        .await?;

        Ok(Box::new(driver))
    }
}

/// Asks the OS for an unused local port.
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

// ============================================================================
// RemoteLauncher
// ============================================================================

/// Connects to an already running BiDi endpoint.
#[derive(Debug, Clone)]
pub struct RemoteLauncher {
    url: String,
    options: BrowserOptions,
}

impl RemoteLauncher {
    /// Creates a launcher for the WebSocket `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, options: BrowserOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

#[async_trait]
impl Launcher for RemoteLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        info!(url = %self.url, "Connecting to remote BiDi endpoint");
        let connection = Connection::connect(&self.url, LAUNCH_TIMEOUT).await?;
        let driver =
            BidiDriver::start(connection, self.options.window_size, None, None).await?;
        Ok(Box::new(driver))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_rejected() {
        let result = FirefoxLauncher::new(
            Some(PathBuf::from("/nonexistent/firefox")),
            BrowserOptions::new(),
        );
        assert!(matches!(result, Err(Error::BrowserNotFound { .. })));
    }

    #[test]
    fn test_default_binary_uses_path_lookup() {
        let launcher = FirefoxLauncher::new(None, BrowserOptions::new()).expect("launcher");
        assert_eq!(launcher.binary, PathBuf::from("firefox"));
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert_ne!(free_port().expect("port"), 0);
    }

    #[test]
    fn test_launcher_for_remote_requires_url() {
        let mut config = RunConfiguration::for_tests();
        config.browser = BrowserKind::Remote;
        config.remote_url = None;
        assert!(matches!(launcher_for(&config), Err(Error::Config { .. })));

        config.remote_url = Some("ws://127.0.0.1:4444/session".into());
        assert!(launcher_for(&config).is_ok());
    }
}
