//! UI automation driver layer.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Capability set the capture core is written against |
//! | [`Launcher`] | Factory for independent driver instances |
//! | [`By`] | Element locator strategies |
//! | [`BrowserOptions`] | Headless flag and window size |
//! | [`BidiDriver`] | WebDriver BiDi implementation of [`Driver`] |
//!
//! # Example
//!
//! ```no_run
//! use dashboard_capture::driver::{BrowserOptions, By, FirefoxLauncher, Launcher};
//!
//! # async fn example() -> dashboard_capture::Result<()> {
//! let launcher = FirefoxLauncher::new(None, BrowserOptions::new().with_headless())?;
//! let driver = launcher.launch().await?;
//!
//! driver.navigate("https://example.com").await?;
//! let heading = driver.find_element(&By::tag("h1")).await?;
//! driver.click(&heading).await?;
//! driver.quit().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// WebDriver BiDi backend.
pub mod bidi;

/// The `Driver` trait and its value types.
pub mod core;

/// Launchers for local and remote browsers.
pub mod launcher;

/// Browser launch options.
pub mod options;

/// Temporary browser profiles.
pub mod profile;

/// Element locator strategies.
pub mod selector;

// ============================================================================
// Re-exports
// ============================================================================

pub use bidi::BidiDriver;
pub use core::{Driver, ElementRef, ScrollMetrics};
pub use launcher::{FirefoxLauncher, Launcher, RemoteLauncher, launcher_for};
pub use options::BrowserOptions;
pub use selector::By;
