//! The automation driver capability set.
//!
//! Everything above this module (sessions, render waits, scroll capture,
//! the runners) talks to a browser only through [`Driver`]. The BiDi
//! backend in [`super::bidi`] is one implementation; tests use an
//! in-memory page.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::selector::By;

// ============================================================================
// Constants
// ============================================================================

/// Reads scroll offset, viewport height and document height in one round trip.
const SCROLL_METRICS_SCRIPT: &str = r#"
    const body = document.body;
    const html = document.documentElement;
    return {
        offset: window.pageYOffset,
        viewport: window.innerHeight,
        document: Math.max(body.scrollHeight, body.offsetHeight, html.scrollHeight, html.offsetHeight)
    };
"#;

// ============================================================================
// ElementRef
// ============================================================================

/// Opaque reference to an element located by a [`Driver`].
///
/// Only meaningful to the driver that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    id: String,
    locator: String,
}

impl ElementRef {
    /// Creates an element reference.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, locator: &By) -> Self {
        Self {
            id: id.into(),
            locator: locator.to_string(),
        }
    }

    /// Returns the driver-specific element id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the locator the element was found with.
    #[inline]
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }
}

// ============================================================================
// ScrollMetrics
// ============================================================================

/// Live vertical scroll geometry of the current page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScrollMetrics {
    /// Current vertical scroll offset.
    pub offset: f64,
    /// Viewport height.
    #[serde(rename = "viewport")]
    pub viewport_height: f64,
    /// Total document height.
    #[serde(rename = "document")]
    pub document_height: f64,
}

impl ScrollMetrics {
    /// Offset of the bottom edge of the viewport.
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.offset + self.viewport_height
    }

    /// Returns `true` once the viewport bottom reaches the document end.
    ///
    /// A gap under one pixel counts as the end: fractional zoom can leave a
    /// clamped offset a sub-pixel short of `document - viewport`.
    #[inline]
    #[must_use]
    pub fn reached_bottom(&self) -> bool {
        self.document_height - self.bottom() < 1.0
    }
}

// ============================================================================
// Driver
// ============================================================================

/// A UI automation driver bound to one browser.
///
/// A driver is exclusively owned by one session. `quit` releases the
/// browser; callers must invoke it exactly once.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigates the current page to `url`.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Finds the first element matching `by`.
    ///
    /// # Errors
    ///
    /// [`Error::ElementNotFound`] if nothing matches.
    async fn find_element(&self, by: &By) -> Result<ElementRef>;

    /// Finds all elements matching `by` (possibly none).
    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>>;

    /// Types `text` into `element`.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Clicks `element`.
    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// Runs a script body in the page and returns its JSON-serializable result.
    ///
    /// The script is a function body: use `return` to produce a value.
    async fn execute_script(&self, script: &str) -> Result<Value>;

    /// Captures the visible viewport as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Releases the browser.
    async fn quit(&self) -> Result<()>;

    /// Scrolls the viewport vertically by `dy` pixels.
    async fn scroll_by(&self, dy: f64) -> Result<()> {
        debug!(dy, "Scrolling by");
        self.execute_script(&format!("window.scrollBy(0, {dy});"))
            .await?;
        Ok(())
    }

    /// Reads the current [`ScrollMetrics`].
    async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
        let value = self.execute_script(SCROLL_METRICS_SCRIPT).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::script_error(format!("Malformed scroll metrics: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
