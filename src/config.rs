//! Run configuration.
//!
//! A run is described by one YAML document, loaded once and passed by
//! value (or `Arc`) into every component. Nothing is read from process
//! globals.
//!
//! ```yaml
//! console_url: https://console.example.com
//! username: reporter
//! password: hunter2
//! browser: firefox
//! headless: true
//! screenshot_dir: captures
//! page_load_wait: 30
//! panel_load_wait: 10
//! scroll_pause_time: 1
//! visualization_render_wait: 2
//! dashboards:
//!   - name: Ops Overview
//!     url: https://console.example.com/en-US/app/ops/overview
//! queries:
//!   - index=main | stats count
//! ```
//!
//! Timing keys are seconds; any missing key falls back to the default
//! listed on [`TimingPolicy`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::debug;
use url::Url;

use crate::driver::options::DEFAULT_WINDOW_SIZE;
use crate::driver::{BrowserOptions, By};
use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_PAGE_LOAD_WAIT: Duration = Duration::from_secs(30);
const DEFAULT_PANEL_LOAD_WAIT: Duration = Duration::from_secs(10);
const DEFAULT_SCROLL_PAUSE: Duration = Duration::from_secs(1);
const DEFAULT_RENDER_SETTLE: Duration = Duration::from_secs(2);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_QUERY_INPUT_WAIT: Duration = Duration::from_secs(2);
const DEFAULT_QUERY_RESULT_WAIT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_SCROLL_STEPS: u32 = 100;
const DEFAULT_SEARCH_PATH: &str = "/en-US/app/search/search";
const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";
const DEFAULT_DASHBOARD_NAME: &str = "dashboard";

// ============================================================================
// Enums
// ============================================================================

/// Which driver backend to launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Spawn a local Firefox and drive it over its built-in BiDi agent.
    #[default]
    Firefox,
    /// Connect to `remote_url`, an existing BiDi WebSocket endpoint.
    Remote,
}

/// What the sequential runner does when a dashboard fails to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationPolicy {
    /// Stop the whole run.
    #[default]
    Abort,
    /// Record the failure and continue with the next dashboard.
    Skip,
}

// ============================================================================
// Secret
// ============================================================================

/// A credential that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext.
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ============================================================================
// TimingPolicy
// ============================================================================

/// Every bounded wait and fixed pause the workflow uses.
///
/// | Key | Field | Default |
/// |-----|-------|---------|
/// | `page_load_wait` | `page_load_timeout` | 30s |
/// | `panel_load_wait` | `panel_load_timeout` | 10s |
/// | `scroll_pause_time` | `scroll_pause` | 1s |
/// | `visualization_render_wait` | `render_settle` | 2s |
/// | `poll_interval` | `poll_interval` | 0.5s |
/// | `query_input_wait` | `query_input_settle` | 2s |
/// | `query_result_wait` | `query_result_wait` | 10s |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    /// Bound on login and dashboard landmark waits.
    #[serde(rename = "page_load_wait", deserialize_with = "seconds")]
    pub page_load_timeout: Duration,

    /// Bound on each polled render-wait stage.
    #[serde(rename = "panel_load_wait", deserialize_with = "seconds")]
    pub panel_load_timeout: Duration,

    /// Pause after each scroll.
    #[serde(rename = "scroll_pause_time", deserialize_with = "seconds")]
    pub scroll_pause: Duration,

    /// Fixed grace period for charts to finish drawing.
    #[serde(rename = "visualization_render_wait", deserialize_with = "seconds")]
    pub render_settle: Duration,

    /// Interval between condition polls.
    #[serde(deserialize_with = "seconds")]
    pub poll_interval: Duration,

    /// Pause between filling the search bar and submitting.
    #[serde(rename = "query_input_wait", deserialize_with = "seconds")]
    pub query_input_settle: Duration,

    /// Fixed wait for search results before the single query capture.
    #[serde(deserialize_with = "seconds")]
    pub query_result_wait: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            page_load_timeout: DEFAULT_PAGE_LOAD_WAIT,
            panel_load_timeout: DEFAULT_PANEL_LOAD_WAIT,
            scroll_pause: DEFAULT_SCROLL_PAUSE,
            render_settle: DEFAULT_RENDER_SETTLE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            query_input_settle: DEFAULT_QUERY_INPUT_WAIT,
            query_result_wait: DEFAULT_QUERY_RESULT_WAIT,
        }
    }
}

/// Reads a non-negative, finite number of seconds.
fn seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        serde::de::Error::custom(format!(
            "expected a non-negative number of seconds, got {secs}"
        ))
    })
}

// ============================================================================
// Selectors
// ============================================================================

/// Locator expressions for the landmarks and controls of the console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Username input on the login page.
    pub username: By,
    /// Password input on the login page.
    pub password: By,
    /// Login submit control.
    pub submit: By,
    /// Element that proves login succeeded.
    pub login_landmark: By,
    /// Element that proves a dashboard shell loaded.
    pub dashboard_landmark: By,
    /// One dashboard panel container.
    pub panel: By,
    /// Loading indicator inside a panel.
    pub loading_indicator: By,
    /// Search query input.
    pub search_bar: By,
    /// Search submit control.
    pub search_button: By,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            username: By::id("username"),
            password: By::id("password"),
            submit: By::css("input[type=\"submit\"]"),
            login_landmark: By::id("dashboard-body"),
            dashboard_landmark: By::css(".dashboard-body"),
            panel: By::css(".dashboard-panel"),
            loading_indicator: By::css(".dashboard-panel .loading"),
            search_bar: By::css("textarea[class='search-bar']"),
            search_button: By::css("button[class*='search-btn']"),
        }
    }
}

// ============================================================================
// DashboardTarget
// ============================================================================

/// One dashboard to capture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardTarget {
    /// Display name, used in file names.
    #[serde(default = "default_dashboard_name")]
    pub name: String,
    /// Navigation URL.
    pub url: String,
}

impl DashboardTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn default_dashboard_name() -> String {
    DEFAULT_DASHBOARD_NAME.to_string()
}

// ============================================================================
// WindowSize
// ============================================================================

/// Browser window dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowSize {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        let (width, height) = DEFAULT_WINDOW_SIZE;
        Self { width, height }
    }
}

// ============================================================================
// RunConfiguration
// ============================================================================

/// Immutable description of one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfiguration {
    /// Console base address; the login page.
    #[serde(alias = "splunk_url")]
    pub console_url: String,

    /// Login name.
    pub username: String,

    /// Login password.
    pub password: Secret,

    /// Driver backend.
    #[serde(default)]
    pub browser: BrowserKind,

    /// Firefox executable; `firefox` on `PATH` when absent.
    #[serde(default)]
    pub firefox_binary: Option<PathBuf>,

    /// BiDi endpoint for the `remote` backend.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Run the browser without a GUI.
    #[serde(default)]
    pub headless: bool,

    /// Browser window size.
    #[serde(default)]
    pub window_size: WindowSize,

    /// Directory screenshots are written to; created if absent.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    /// Dashboards for the sequential runner, in capture order.
    #[serde(default)]
    pub dashboards: Vec<DashboardTarget>,

    /// Search queries for the concurrent runner.
    #[serde(default)]
    pub queries: Vec<String>,

    /// Path of the search page, joined onto `console_url`.
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// Sequential-mode reaction to a dashboard that fails to load.
    #[serde(default)]
    pub on_navigation_error: NavigationPolicy,

    /// Upper bound on scroll steps per dashboard.
    #[serde(default = "default_max_scroll_steps")]
    pub max_scroll_steps: u32,

    /// Locator overrides.
    #[serde(default)]
    pub selectors: Selectors,

    /// Waits and pauses.
    #[serde(flatten)]
    pub timing: TimingPolicy,
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCREENSHOT_DIR)
}

fn default_search_path() -> String {
    DEFAULT_SEARCH_PATH.to_string()
}

fn default_max_scroll_steps() -> u32 {
    DEFAULT_MAX_SCROLL_STEPS
}

impl RunConfiguration {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML,
    /// or fails [`RunConfiguration::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Could not read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml(&text)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.console_url)
            .map_err(|e| Error::config(format!("console_url `{}`: {e}", self.console_url)))?;

        for dashboard in &self.dashboards {
            if dashboard.name.trim().is_empty() {
                return Err(Error::config(format!(
                    "dashboard `{}` has an empty name",
                    dashboard.url
                )));
            }
            Url::parse(&dashboard.url).map_err(|e| {
                Error::config(format!("dashboard `{}` url: {e}", dashboard.name))
            })?;
        }

        if self.max_scroll_steps == 0 {
            return Err(Error::config("max_scroll_steps must be at least 1"));
        }

        if self.browser == BrowserKind::Remote && self.remote_url.is_none() {
            return Err(Error::config("browser `remote` requires `remote_url`"));
        }

        self.browser_options().validate().map_err(Error::config)?;
        Ok(())
    }

    /// URL of the search page: `search_path` appended to the console URL,
    /// keeping any path prefix the console is served under.
    ///
    /// # Errors
    ///
    /// Returns an error if the console URL does not parse.
    pub fn search_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.console_url)?;
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.search_path.trim_start_matches('/')
        );
        url.set_path(&path);
        Ok(url.to_string())
    }

    /// Launch options derived from `headless` and `window_size`.
    #[must_use]
    pub fn browser_options(&self) -> BrowserOptions {
        let options = BrowserOptions::new()
            .with_window_size(self.window_size.width, self.window_size.height);
        if self.headless {
            options.with_headless()
        } else {
            options
        }
    }
}

#[cfg(test)]
impl RunConfiguration {
    /// Minimal valid configuration with zeroed pauses.
    pub(crate) fn for_tests() -> Self {
        Self::from_yaml(
            r#"
console_url: https://console.test
username: tester
password: secret
scroll_pause_time: 0
visualization_render_wait: 0
poll_interval: 0.1
query_input_wait: 0
query_result_wait: 0
"#,
        )
        .expect("test configuration")
    }
}

// ============================================================================
// Tests
// ============================================================================
