//! Dashboard render-wait engine.
//!
//! Three stages, in order:
//!
//! | Stage | Condition | Bound |
//! |-------|-----------|-------|
//! | 1 | at least one panel container present | `panel_load_wait` |
//! | 2 | no loading indicator present | `panel_load_wait` |
//! | 3 | fixed settle delay for chart drawing | `visualization_render_wait` |
//!
//! A timeout in stage 1 or 2 is logged and absorbed: the engine returns
//! [`PanelReadiness::Partial`] and the remaining stages are skipped, so a
//! call never takes longer than two panel timeouts plus the settle delay.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::driver::{By, Driver};
use crate::error::{Error, Severity};
use crate::session::Session;
use crate::wait::Wait;

// ============================================================================
// Types
// ============================================================================

/// The polled stage that timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// No panel container appeared.
    Panels,
    /// A loading indicator never cleared.
    Loading,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panels => f.write_str("panels"),
            Self::Loading => f.write_str("loading indicators"),
        }
    }
}

/// Outcome of a render wait. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelReadiness {
    /// Every stage completed.
    Ready,
    /// A polled stage timed out; capture proceeds with what has rendered.
    Partial(RenderStage),
}

impl PanelReadiness {
    /// Returns `true` if every stage completed.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

// ============================================================================
// RenderWait
// ============================================================================

/// Composite wait for dashboard panels.
#[derive(Debug, Clone)]
pub struct RenderWait {
    wait: Wait,
    settle: Duration,
    panel: By,
    loading: By,
}

impl RenderWait {
    /// Builds the engine from a session's timing and locators.
    #[must_use]
    pub fn for_session(session: &Session) -> Self {
        let timing = session.timing();
        let selectors = session.selectors();
        Self {
            wait: Wait::new(timing.panel_load_timeout, timing.poll_interval),
            settle: timing.render_settle,
            panel: selectors.panel.clone(),
            loading: selectors.loading_indicator.clone(),
        }
    }

    /// Runs the three stages against `driver`.
    pub async fn await_ready(&self, driver: &dyn Driver) -> PanelReadiness {
        if let Err(e) = self.wait.for_element(driver, &self.panel).await {
            return absorb(RenderStage::Panels, e);
        }
        debug!("Panels present");

        if let Err(e) = self.wait.for_absence(driver, &self.loading).await {
            return absorb(RenderStage::Loading, e);
        }
        debug!("Loading indicators cleared");

        sleep(self.settle).await;
        PanelReadiness::Ready
    }
}

fn absorb(stage: RenderStage, error: Error) -> PanelReadiness {
    debug_assert_eq!(error.severity(), Severity::Recoverable);
    warn!(%stage, error = %error, "Render wait timed out; capturing anyway");
    PanelReadiness::Partial(stage)
}

/// Waits for the session's current page to finish rendering its panels.
pub async fn await_panels_ready(session: &Session) -> PanelReadiness {
    RenderWait::for_session(session)
        .await_ready(session.driver())
        .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tokio::time::Instant;

    use super::*;
    use crate::config::Selectors;
    use crate::testing::{FakeDriver, FakePage, Loading};

    fn engine(panel_secs: u64, settle_secs: u64) -> RenderWait {
        let selectors = Selectors::default();
        RenderWait {
            wait: Wait::new(Duration::from_secs(panel_secs), Duration::from_millis(500)),
            settle: Duration::from_secs(settle_secs),
            panel: selectors.panel,
            loading: selectors.loading_indicator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_page_waits_only_settle() {
        let (driver, _) = FakeDriver::new(FakePage::default());
        let start = Instant::now();

        let readiness = engine(10, 2).await_ready(&driver).await;

        assert_eq!(readiness, PanelReadiness::Ready);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_loading_indicator_still_returns() {
        let page = FakePage::default().with_loading(Loading::Forever);
        let (driver, _) = FakeDriver::new(page);
        let start = Instant::now();

        let readiness = engine(10, 2).await_ready(&driver).await;

        assert_eq!(readiness, PanelReadiness::Partial(RenderStage::Loading));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_panels_still_returns() {
        let page = FakePage::default().with_panels(0, Duration::ZERO);
        let (driver, _) = FakeDriver::new(page);

        let readiness = engine(5, 2).await_ready(&driver).await;
        assert_eq!(readiness, PanelReadiness::Partial(RenderStage::Panels));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_clears_mid_wait() {
        let page = FakePage::default().with_loading(Loading::For(Duration::from_secs(3)));
        let (driver, _) = FakeDriver::new(page);
        let start = Instant::now();

        let readiness = engine(10, 1).await_ready(&driver).await;

        assert!(readiness.is_ready());
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_render_wait_is_bounded(
            panel_secs in 0u64..20,
            settle_secs in 0u64..5,
            panels_after in 0u64..30,
            loading in prop_oneof![
                Just(Loading::Never),
                Just(Loading::Forever),
                (0u64..30).prop_map(|s| Loading::For(Duration::from_secs(s))),
            ],
        ) {
            let elapsed = tokio_test::block_on(async {
                tokio::time::pause();
                let page = FakePage::default()
                    .with_panels(2, Duration::from_secs(panels_after))
                    .with_loading(loading);
                let (driver, _) = FakeDriver::new(page);
                let start = Instant::now();
                engine(panel_secs, settle_secs).await_ready(&driver).await;
                start.elapsed()
            });

            let bound = Duration::from_secs(2 * panel_secs + settle_secs);
            prop_assert!(elapsed <= bound, "{elapsed:?} > {bound:?}");
        }
    }
}
