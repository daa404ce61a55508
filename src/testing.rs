//! Scripted in-memory page for exercising the capture core without a browser.
//!
//! [`FakeDriver`] implements [`Driver`] against a [`FakePage`] description:
//! a scrollable document that clamps its offset like a real viewport,
//! panels that appear after a delay, a loading indicator that clears (or
//! never clears), and optional fault injection per operation.
//!
//! Delays are measured on the tokio clock, so tests running with
//! `start_paused = true` see them elapse instantly and deterministically.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::config::Selectors;
use crate::driver::{By, Driver, ElementRef, Launcher};
use crate::error::{Error, Result};

// ============================================================================
// FakePage
// ============================================================================

/// When the loading indicator is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loading {
    /// Never shown.
    Never,
    /// Shown until this long after the driver was created.
    For(Duration),
    /// Never clears.
    Forever,
}

/// Description of the simulated page.
#[derive(Debug, Clone)]
pub struct FakePage {
    /// Initial document height.
    pub document_height: f64,
    /// Viewport height.
    pub viewport_height: f64,
    /// Document growth per scroll, for pages that keep appending content.
    pub growth_per_scroll: f64,
    /// Number of panel containers once they appear.
    pub panels: usize,
    /// Delay before panels appear.
    pub panels_after: Duration,
    /// Loading indicator behavior.
    pub loading: Loading,
    /// Elements that are always present (landmarks, inputs, buttons).
    pub present: Vec<By>,
    /// Present elements that only appear after a delay.
    pub delayed: Vec<(By, Duration)>,
    /// Operation that fails with a script error, e.g. `"screenshot"`.
    pub fail_on: Option<&'static str>,
    /// URLs whose dashboard landmark never appears.
    pub broken_urls: Vec<String>,
    /// Scripts or keystrokes containing this text fail.
    pub poison: Option<String>,
    /// Screenshot dimensions.
    pub screenshot_size: (u32, u32),
    /// Locators treated as panel containers and loading indicators.
    pub selectors: Selectors,
}

impl FakePage {
    /// A fully loaded page of the given geometry with every default
    /// landmark present.
    #[must_use]
    pub fn new(document_height: f64, viewport_height: f64) -> Self {
        let selectors = Selectors::default();
        let present = vec![
            selectors.username.clone(),
            selectors.password.clone(),
            selectors.submit.clone(),
            selectors.login_landmark.clone(),
            selectors.dashboard_landmark.clone(),
            selectors.search_bar.clone(),
            selectors.search_button.clone(),
        ];
        Self {
            document_height,
            viewport_height,
            growth_per_scroll: 0.0,
            panels: 3,
            panels_after: Duration::ZERO,
            loading: Loading::Never,
            present,
            delayed: Vec::new(),
            fail_on: None,
            broken_urls: Vec::new(),
            poison: None,
            screenshot_size: (4, 3),
            selectors,
        }
    }

    /// Removes `by` from the always-present elements.
    #[must_use]
    pub fn without(mut self, by: &By) -> Self {
        self.present.retain(|p| p != by);
        self
    }

    /// Makes the present element `by` appear only after `after`.
    #[must_use]
    pub fn with_delayed(mut self, by: By, after: Duration) -> Self {
        self.delayed.push((by, after));
        self
    }

    /// Sets the loading indicator behavior.
    #[must_use]
    pub fn with_loading(mut self, loading: Loading) -> Self {
        self.loading = loading;
        self
    }

    /// Sets panel count and appearance delay.
    #[must_use]
    pub fn with_panels(mut self, panels: usize, after: Duration) -> Self {
        self.panels = panels;
        self.panels_after = after;
        self
    }

    /// Makes the document grow on every scroll.
    #[must_use]
    pub fn with_growth(mut self, growth_per_scroll: f64) -> Self {
        self.growth_per_scroll = growth_per_scroll;
        self
    }

    /// Makes the dashboard landmark missing after navigating to `url`.
    #[must_use]
    pub fn with_broken_url(mut self, url: impl Into<String>) -> Self {
        self.broken_urls.push(url.into());
        self
    }

    /// Fails any script or keystroke batch containing `marker`.
    #[must_use]
    pub fn with_poison(mut self, marker: impl Into<String>) -> Self {
        self.poison = Some(marker.into());
        self
    }

    /// Injects a failure into `operation`.
    #[must_use]
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new(1000.0, 1000.0)
    }
}

// ============================================================================
// FakeHandle
// ============================================================================

/// Observation side of a [`FakeDriver`], kept by tests after the driver
/// has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct FakeHandle {
    quits: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl FakeHandle {
    /// How many times `quit` was called.
    #[must_use]
    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    /// Every navigation, keystroke batch, click and unrecognized script, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().push(action);
    }
}

// ============================================================================
// FakeDriver
// ============================================================================

struct PageState {
    offset: f64,
    document_height: f64,
    current_url: Option<String>,
}

/// In-memory [`Driver`].
pub struct FakeDriver {
    page: FakePage,
    state: Mutex<PageState>,
    created: Instant,
    handle: FakeHandle,
}

impl FakeDriver {
    /// Creates a driver over `page`, returning the driver and its handle.
    #[must_use]
    pub fn new(page: FakePage) -> (Self, FakeHandle) {
        let handle = FakeHandle::default();
        let state = PageState {
            offset: 0.0,
            document_height: page.document_height,
            current_url: None,
        };
        let driver = Self {
            page,
            state: Mutex::new(state),
            created: Instant::now(),
            handle: handle.clone(),
        };
        (driver, handle)
    }

    /// URL of the last navigation.
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.state.lock().current_url.clone()
    }

    fn check_fault(&self, operation: &str) -> Result<()> {
        match self.page.fail_on {
            Some(op) if op == operation => {
                Err(Error::script_error(format!("injected failure in {operation}")))
            }
            _ => Ok(()),
        }
    }

    fn check_poison(&self, text: &str) -> Result<()> {
        match &self.page.poison {
            Some(marker) if text.contains(marker.as_str()) => {
                Err(Error::script_error(format!("poisoned input: {marker}")))
            }
            _ => Ok(()),
        }
    }

    fn count(&self, by: &By) -> usize {
        let elapsed = self.created.elapsed();
        if *by == self.page.selectors.panel {
            return if elapsed >= self.page.panels_after {
                self.page.panels
            } else {
                0
            };
        }
        if *by == self.page.selectors.loading_indicator {
            let visible = match self.page.loading {
                Loading::Never => false,
                Loading::For(duration) => elapsed < duration,
                Loading::Forever => true,
            };
            return usize::from(visible);
        }
        if *by == self.page.selectors.dashboard_landmark {
            let state = self.state.lock();
            if let Some(url) = &state.current_url
                && self.page.broken_urls.contains(url)
            {
                return 0;
            }
        }
        if self
            .page
            .delayed
            .iter()
            .any(|(delayed, after)| delayed == by && elapsed < *after)
        {
            return 0;
        }
        usize::from(self.page.present.contains(by))
    }

    fn scroll(&self, dy: f64) {
        let mut state = self.state.lock();
        state.document_height += self.page.growth_per_scroll;
        let max_offset = (state.document_height - self.page.viewport_height).max(0.0);
        state.offset = (state.offset + dy).clamp(0.0, max_offset);
    }

    fn png(&self) -> Result<Vec<u8>> {
        let (width, height) = self.page.screenshot_size;
        let image: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgba([32, 64, 128, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| Error::script_error(format!("png encode: {e}")))?;
        Ok(bytes.into_inner())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.check_fault("navigate")?;
        self.handle.record(format!("navigate {url}"));
        let mut state = self.state.lock();
        state.current_url = Some(url.to_string());
        state.offset = 0.0;
        Ok(())
    }

    async fn find_element(&self, by: &By) -> Result<ElementRef> {
        self.find_elements(by)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::element_not_found(by.to_string()))
    }

    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>> {
        self.check_fault("find_elements")?;
        Ok((0..self.count(by))
            .map(|i| ElementRef::new(format!("{by}#{i}"), by))
            .collect())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.check_fault("send_keys")?;
        self.check_poison(text)?;
        self.handle
            .record(format!("keys {} {text}", element.locator()));
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.check_fault("click")?;
        self.handle.record(format!("click {}", element.locator()));
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.check_fault("execute_script")?;
        self.check_poison(script)?;

        if let Some(rest) = script.trim().strip_prefix("window.scrollBy(0, ") {
            let dy: f64 = rest
                .trim_end_matches(';')
                .trim_end_matches(')')
                .parse()
                .map_err(|e| Error::script_error(format!("bad scroll amount: {e}")))?;
            self.scroll(dy);
            return Ok(Value::Null);
        }

        if script.contains("pageYOffset") {
            let state = self.state.lock();
            return Ok(json!({
                "offset": state.offset,
                "viewport": self.page.viewport_height,
                "document": state.document_height,
            }));
        }

        self.handle.record(format!("script {script}"));
        Ok(Value::Null)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.check_fault("screenshot")?;
        self.png()
    }

    async fn quit(&self) -> Result<()> {
        self.handle.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// FakeLauncher
// ============================================================================

/// Launches one [`FakeDriver`] per call, taking pages in order.
///
/// Every launched driver shares the launcher's [`FakeHandle`], so quit
/// counts and actions aggregate across launches.
pub struct FakeLauncher {
    pages: Mutex<VecDeque<FakePage>>,
    fallback: FakePage,
    launches: AtomicUsize,
    handle: FakeHandle,
}

impl FakeLauncher {
    /// Launcher that hands out `pages` in order, then clones of `fallback`.
    #[must_use]
    pub fn new(pages: Vec<FakePage>, fallback: FakePage) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fallback,
            launches: AtomicUsize::new(0),
            handle: FakeHandle::default(),
        }
    }

    /// Launcher that always produces `page`.
    #[must_use]
    pub fn repeating(page: FakePage) -> Self {
        Self::new(Vec::new(), page)
    }

    /// Shared observation handle.
    #[must_use]
    pub fn handle(&self) -> FakeHandle {
        self.handle.clone()
    }

    /// Number of drivers launched.
    #[must_use]
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let page = self
            .pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let (mut driver, _) = FakeDriver::new(page);
        driver.handle = self.handle.clone();
        Ok(Box::new(driver))
    }
}

// ============================================================================
// Tests
// ============================================================================
