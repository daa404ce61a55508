//! Sequential dashboard runner.
//!
//! One session, every configured dashboard in order:
//!
//! ```text
//! launch -> login -> for each dashboard:
//!                        navigate_and_wait -> await_panels_ready -> scroll capture
//!        -> close
//! ```
//!
//! The session is closed on every path. A navigation failure aborts the run
//! unless `on_navigation_error: skip`, in which case it is recorded and the
//! next dashboard proceeds.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::capture::{CaptureStatus, CaptureStore, DashboardCapture, ScrollCapture};
use crate::config::{DashboardTarget, NavigationPolicy, RunConfiguration};
use crate::driver::Launcher;
use crate::error::{Error, Result};
use crate::render::await_panels_ready;
use crate::session::Session;

// ============================================================================
// RunReport
// ============================================================================

/// A dashboard that was skipped after a navigation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDashboard {
    /// Display name.
    pub name: String,
    /// Target URL.
    pub url: String,
    /// Rendered navigation error.
    pub reason: String,
}

/// Everything a sequential run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Captured dashboards, in configuration order.
    pub dashboards: Vec<DashboardCapture>,
    /// Dashboards skipped under [`NavigationPolicy::Skip`].
    pub skipped: Vec<SkippedDashboard>,
}

impl RunReport {
    /// Total screenshots written.
    #[must_use]
    pub fn total_captures(&self) -> usize {
        self.dashboards.iter().map(|d| d.captures.len()).sum()
    }

    /// Returns `true` if nothing was skipped and every capture reached the
    /// end of its page.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
            && self
                .dashboards
                .iter()
                .all(|d| d.status == CaptureStatus::Complete)
    }
}

// ============================================================================
// DashboardRunner
// ============================================================================

/// Captures every configured dashboard with one session.
pub struct DashboardRunner {
    config: Arc<RunConfiguration>,
    launcher: Arc<dyn Launcher>,
    store: CaptureStore,
}

impl DashboardRunner {
    /// Creates a runner writing to the configured `screenshot_dir`.
    #[must_use]
    pub fn new(config: Arc<RunConfiguration>, launcher: Arc<dyn Launcher>) -> Self {
        let store = CaptureStore::new(&config.screenshot_dir);
        Self {
            config,
            launcher,
            store,
        }
    }

    /// Runs the whole sequence.
    ///
    /// # Errors
    ///
    /// - launch and login errors
    /// - [`Error::Navigation`] under [`NavigationPolicy::Abort`]
    /// - driver and I/O errors raised while capturing
    pub async fn run(&self) -> Result<RunReport> {
        if self.config.dashboards.is_empty() {
            warn!("No dashboards configured");
            return Ok(RunReport::default());
        }

        info!(
            dashboards = self.config.dashboards.len(),
            dir = %self.store.dir().display(),
            "Starting dashboard run"
        );

        let driver = self.launcher.launch().await?;
        let session = Session::login(driver, &self.config).await?;

        let outcome = self.capture_all(&session).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Driver did not quit cleanly");
        }

        match &outcome {
            Ok(report) => info!(
                captured = report.dashboards.len(),
                skipped = report.skipped.len(),
                screens = report.total_captures(),
                "Dashboard run finished"
            ),
            Err(e) => error!(error = %e, "Dashboard run aborted"),
        }
        outcome
    }

    async fn capture_all(&self, session: &Session) -> Result<RunReport> {
        let mut report = RunReport::default();

        for target in &self.config.dashboards {
            match self.capture_one(session, target).await {
                Ok(capture) => report.dashboards.push(capture),
                Err(e @ Error::Navigation { .. })
                    if self.config.on_navigation_error == NavigationPolicy::Skip =>
                {
                    warn!(dashboard = %target.name, error = %e, "Skipping dashboard");
                    report.skipped.push(SkippedDashboard {
                        name: target.name.clone(),
                        url: target.url.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn capture_one(
        &self,
        session: &Session,
        target: &DashboardTarget,
    ) -> Result<DashboardCapture> {
        info!(session_id = %session.id(), dashboard = %target.name, "Processing dashboard");

        session.navigate_and_wait(&target.url).await?;
        await_panels_ready(session).await;

        ScrollCapture::new(session, &self.store, self.config.max_scroll_steps)
            .run(&target.name)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{FakeLauncher, FakePage};

    const OPS: &str = "https://console.test/app/ops";
    const SEC: &str = "https://console.test/app/sec";

    fn config(temp: &TempDir, policy: NavigationPolicy) -> Arc<RunConfiguration> {
        let mut config = RunConfiguration::for_tests();
        config.screenshot_dir = temp.path().to_path_buf();
        config.on_navigation_error = policy;
        config.dashboards = vec![
            DashboardTarget::new("Ops Overview", OPS),
            DashboardTarget::new("Security", SEC),
        ];
        Arc::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_captures_every_dashboard_in_order() {
        let temp = TempDir::new().expect("tempdir");
        let launcher = Arc::new(FakeLauncher::repeating(FakePage::new(2500.0, 1000.0)));
        let handle = launcher.handle();

        let report = DashboardRunner::new(config(&temp, NavigationPolicy::Abort), launcher.clone())
            .run()
            .await
            .expect("run");

        assert_eq!(launcher.launches(), 1);
        assert_eq!(handle.quit_count(), 1);
        assert!(report.is_complete());
        assert_eq!(report.dashboards[0].dashboard, "Ops Overview");
        assert_eq!(report.dashboards[1].dashboard, "Security");
        assert_eq!(
            report.dashboards[0].labels(),
            ["top", "position_1", "position_2"]
        );
        assert_eq!(report.total_captures(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_aborts_and_releases() {
        let temp = TempDir::new().expect("tempdir");
        let launcher = Arc::new(FakeLauncher::repeating(
            FakePage::default().with_broken_url(OPS),
        ));
        let handle = launcher.handle();

        let result = DashboardRunner::new(config(&temp, NavigationPolicy::Abort), launcher)
            .run()
            .await;

        assert!(matches!(result, Err(Error::Navigation { .. })));
        assert_eq!(handle.quit_count(), 1);
        assert!(!handle.actions().iter().any(|a| a.ends_with(SEC)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_skipped_under_skip_policy() {
        let temp = TempDir::new().expect("tempdir");
        let launcher = Arc::new(FakeLauncher::repeating(
            FakePage::default().with_broken_url(OPS),
        ));
        let handle = launcher.handle();

        let report = DashboardRunner::new(config(&temp, NavigationPolicy::Skip), launcher)
            .run()
            .await
            .expect("run");

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "Ops Overview");
        assert_eq!(report.dashboards.len(), 1);
        assert_eq!(report.dashboards[0].dashboard, "Security");
        assert!(!report.is_complete());
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_releases_once() {
        let temp = TempDir::new().expect("tempdir");
        let cfg = config(&temp, NavigationPolicy::Abort);
        let launcher = Arc::new(FakeLauncher::repeating(
            FakePage::default().without(&cfg.selectors.login_landmark),
        ));
        let handle = launcher.handle();

        let result = DashboardRunner::new(cfg, launcher).run().await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_error_releases_once() {
        let temp = TempDir::new().expect("tempdir");
        let launcher = Arc::new(FakeLauncher::repeating(
            FakePage::default().failing_on("screenshot"),
        ));
        let handle = launcher.handle();

        let result = DashboardRunner::new(config(&temp, NavigationPolicy::Skip), launcher)
            .run()
            .await;

        assert!(result.expect_err("screenshot fails").is_driver_error());
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test]
    async fn test_no_dashboards_launches_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let mut cfg = RunConfiguration::for_tests();
        cfg.screenshot_dir = temp.path().to_path_buf();
        let launcher = Arc::new(FakeLauncher::repeating(FakePage::default()));

        let report = DashboardRunner::new(Arc::new(cfg), launcher.clone())
            .run()
            .await
            .expect("run");

        assert_eq!(report.total_captures(), 0);
        assert_eq!(launcher.launches(), 0);
    }
}
