//! Scroll-and-capture state machine.
//!
//! ```text
//! Start -> Capturing(0) -> Scrolled(1) -> Capturing(1) -> Scrolled(2) -> ... -> Done
//!                                                       \-> Incomplete
//! ```
//!
//! `Capturing(0)` is the unscrolled "top" view. Each `Scrolled(n)` step
//! scrolls by one viewport height, pauses, and re-runs the render wait
//! since scrolling can trigger lazy panels. After `Capturing(n)` the live
//! scroll metrics decide: viewport bottom at or past the document end is
//! `Done`; otherwise the next step runs, up to `max_scroll_steps`, after
//! which the capture ends as `Incomplete`.
//!
//! A page that is fully visible from the start still gets one scroll step
//! and a `position_1` capture.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::driver::{Driver, ScrollMetrics};
use crate::error::Result;
use crate::render::RenderWait;
use crate::session::Session;

use super::storage::{CaptureResult, CaptureStore, PositionLabel};

// ============================================================================
// State
// ============================================================================

/// Machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// Nothing captured yet.
    Start,
    /// About to capture position `n` (0 is the top).
    Capturing(u32),
    /// Scroll step `n` performed and rendered.
    Scrolled(u32),
    /// Viewport reached the document end.
    Done,
    /// Step bound hit before the document end.
    Incomplete,
}

impl ScrollState {
    /// Returns `true` for `Done` and `Incomplete`.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Incomplete)
    }
}

/// Per-dashboard scroll bookkeeping. Created fresh for each dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollCursor {
    /// Last observed scroll offset.
    pub offset: f64,
    /// Last observed document height.
    pub document_height: f64,
    /// Scroll steps taken.
    pub index: u32,
}

impl ScrollCursor {
    fn observe(&mut self, metrics: &ScrollMetrics) {
        self.offset = metrics.offset;
        self.document_height = metrics.document_height;
    }
}

/// How a dashboard's capture sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Viewport reached the document end.
    Complete,
    /// Stopped at the step bound; the page kept growing.
    Incomplete,
}

/// Ordered captures for one dashboard.
#[derive(Debug, Clone)]
pub struct DashboardCapture {
    /// Dashboard display name.
    pub dashboard: String,
    /// `top` then each `position_<n>`, in capture order.
    pub captures: Vec<CaptureResult>,
    /// Termination outcome.
    pub status: CaptureStatus,
    /// Scroll steps whose render wait timed out.
    pub partial_renders: u32,
}

impl DashboardCapture {
    /// Capture labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.captures.iter().map(|c| c.label.to_string()).collect()
    }
}

// ============================================================================
// ScrollCapture
// ============================================================================

/// Runs the state machine for one dashboard on one session.
pub struct ScrollCapture<'a> {
    driver: &'a dyn Driver,
    store: &'a CaptureStore,
    render: RenderWait,
    scroll_pause: Duration,
    max_steps: u32,
}

impl<'a> ScrollCapture<'a> {
    /// Binds the machine to a session's driver and timing.
    ///
    /// `max_steps` is clamped to at least 1.
    #[must_use]
    pub fn new(session: &'a Session, store: &'a CaptureStore, max_steps: u32) -> Self {
        Self {
            driver: session.driver(),
            store,
            render: RenderWait::for_session(session),
            scroll_pause: session.timing().scroll_pause,
            max_steps: max_steps.max(1),
        }
    }

    /// Captures the current page from the top down.
    ///
    /// # Errors
    ///
    /// Any driver or I/O error aborts the sequence. Render-wait timeouts
    /// do not.
    pub async fn run(&self, dashboard: &str) -> Result<DashboardCapture> {
        let mut cursor = ScrollCursor::default();
        let mut captures = Vec::new();
        let mut partial_renders = 0;
        let mut state = ScrollState::Start;

        info!(dashboard, "Starting scroll capture");

        while !state.is_terminal() {
            state = match state {
                ScrollState::Start => ScrollState::Capturing(0),

                ScrollState::Capturing(n) => {
                    let label = if n == 0 {
                        PositionLabel::Top
                    } else {
                        PositionLabel::Position(n)
                    };
                    captures.push(self.store.save(self.driver, dashboard, label).await?);

                    if n == 0 {
                        self.scroll_step(&mut cursor, &mut partial_renders).await?
                    } else {
                        let metrics = self.driver.scroll_metrics().await?;
                        cursor.observe(&metrics);
                        debug!(
                            dashboard,
                            bottom = metrics.bottom(),
                            document = metrics.document_height,
                            "Scroll position"
                        );

                        if metrics.reached_bottom() {
                            ScrollState::Done
                        } else if cursor.index >= self.max_steps {
                            ScrollState::Incomplete
                        } else {
                            self.scroll_step(&mut cursor, &mut partial_renders).await?
                        }
                    }
                }

                ScrollState::Scrolled(n) => ScrollState::Capturing(n),

                terminal => terminal,
            };
        }

        let status = if state == ScrollState::Done {
            info!(dashboard, screens = captures.len(), "Scroll capture complete");
            CaptureStatus::Complete
        } else {
            warn!(
                dashboard,
                screens = captures.len(),
                max_steps = self.max_steps,
                document = cursor.document_height,
                "Step bound reached before the end of the page"
            );
            CaptureStatus::Incomplete
        };

        Ok(DashboardCapture {
            dashboard: dashboard.to_string(),
            captures,
            status,
            partial_renders,
        })
    }

    /// Scrolls one viewport height, pauses, and waits for panels.
    async fn scroll_step(
        &self,
        cursor: &mut ScrollCursor,
        partial_renders: &mut u32,
    ) -> Result<ScrollState> {
        let metrics = self.driver.scroll_metrics().await?;
        cursor.observe(&metrics);

        self.driver.scroll_by(metrics.viewport_height).await?;
        cursor.index += 1;
        sleep(self.scroll_pause).await;

        if !self.render.await_ready(self.driver).await.is_ready() {
            *partial_renders += 1;
        }
        Ok(ScrollState::Scrolled(cursor.index))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;
    use crate::config::RunConfiguration;
    use crate::testing::{FakeDriver, FakeHandle, FakePage, Loading};

    async fn capture(page: FakePage, max_steps: u32) -> (Result<DashboardCapture>, FakeHandle) {
        let config = RunConfiguration::for_tests();
        let temp = TempDir::new().expect("tempdir");
        let store = CaptureStore::new(temp.path());
        let (driver, handle) = FakeDriver::new(page);
        let session = Session::login(Box::new(driver), &config)
            .await
            .expect("login");

        let result = ScrollCapture::new(&session, &store, max_steps)
            .run("Ops Overview")
            .await;
        session.close().await.expect("close");
        (result, handle)
    }

    fn positions(n: u32) -> Vec<String> {
        std::iter::once("top".to_string())
            .chain((1..=n).map(|i| format!("position_{i}")))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tall_page_sequence() {
        let (result, _) = capture(FakePage::new(5000.0, 1000.0), 100).await;
        let capture = result.expect("capture");

        // The viewport clamps at offset 4000, where bottom == document ends
        // the loop: five viewports give top plus four positions, not five.
        assert_eq!(capture.status, CaptureStatus::Complete);
        assert_eq!(capture.labels(), positions(4));
        assert!(capture.captures.iter().all(|c| c.dashboard == "Ops Overview"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fully_visible_page_still_scrolls_once() {
        let (result, _) = capture(FakePage::new(800.0, 1000.0), 100).await;
        assert_eq!(result.expect("capture").labels(), positions(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_growing_page_stops_at_bound() {
        let page = FakePage::new(3000.0, 1000.0).with_growth(2000.0);
        let (result, _) = capture(page, 5).await;
        let capture = result.expect("capture");

        assert_eq!(capture.status, CaptureStatus::Incomplete);
        assert_eq!(capture.labels(), positions(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_loading_indicator_still_captures() {
        let page = FakePage::new(2000.0, 1000.0).with_loading(Loading::Forever);
        let (result, _) = capture(page, 100).await;
        let capture = result.expect("capture");

        assert_eq!(capture.labels(), positions(1));
        assert_eq!(capture.partial_renders, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_failure_aborts() {
        let page = FakePage::new(2000.0, 1000.0).failing_on("screenshot");
        let (result, handle) = capture(page, 100).await;

        assert!(result.expect_err("fails").is_driver_error());
        assert_eq!(handle.quit_count(), 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ScrollState::Done.is_terminal());
        assert!(ScrollState::Incomplete.is_terminal());
        assert!(!ScrollState::Scrolled(3).is_terminal());
        assert!(!ScrollState::Start.is_terminal());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_capture_count_matches_geometry(
            viewport in 200u32..1500,
            pages_tall in 0.2f64..12.0,
        ) {
            let viewport = f64::from(viewport);
            let height = (viewport * pages_tall).round().max(1.0);
            let (result, _) = tokio_test::block_on(async {
                tokio::time::pause();
                capture(FakePage::new(height, viewport), 100).await
            });
            let capture = result.expect("capture");

            let expected = ((height / viewport).ceil() as usize).max(2);
            prop_assert_eq!(capture.captures.len(), expected);
            prop_assert_eq!(capture.status, CaptureStatus::Complete);
        }
    }
}
