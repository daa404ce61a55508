//! Dashboard Capture - scroll-and-capture screenshots of analytics dashboards.
//!
//! This library logs in to a web analytics console, visits configured
//! dashboards, waits for their asynchronously rendered panels, and scrolls
//! through each page capturing a screenshot per viewport. A second mode
//! runs many search queries concurrently, one isolated browser each.
//!
//! # Architecture
//!
//! - **Driver layer**: a [`Driver`] trait over navigate, locate, type,
//!   click, script, scroll and screenshot, implemented over WebDriver BiDi
//! - **Core**: wait primitives, sessions, the render-wait engine and the
//!   scroll-capture state machine, written against [`Driver`] only
//! - **Runners**: [`DashboardRunner`] (one session, dashboards in order)
//!   and [`QueryRunner`] (one task and one session per query)
//!
//! Key design principles:
//!
//! - Each [`Session`] exclusively owns its driver and releases it exactly once
//! - Panel render timeouts are absorbed; login and navigation failures are not
//! - Configuration is one immutable value passed down, never global
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dashboard_capture::{DashboardRunner, Result, RunConfiguration, launcher_for};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(RunConfiguration::load("config.yaml")?);
//!     let launcher = launcher_for(&config)?;
//!
//!     let report = DashboardRunner::new(config, launcher).run().await?;
//!     println!("{} screenshots", report.total_captures());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`RunConfiguration`] loaded from YAML |
//! | [`driver`] | [`Driver`] trait, launchers, BiDi backend |
//! | [`wait`] | Polling [`Wait`] primitives |
//! | [`session`] | Login and guarded navigation |
//! | [`render`] | Panel render-wait engine |
//! | [`capture`] | Scroll capture and screenshot storage |
//! | [`orchestrator`] | Sequential [`DashboardRunner`] |
//! | [`runner`] | Concurrent [`QueryRunner`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Screenshot capture.
///
/// - [`ScrollCapture`] - top-to-bottom capture of one dashboard
/// - [`CaptureStore`] - file naming and persistence
pub mod capture;

/// Run configuration.
pub mod config;

/// UI automation driver layer.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Sequential dashboard runner.
pub mod orchestrator;

/// Panel render-wait engine.
pub mod render;

/// Concurrent query runner.
pub mod runner;

/// Authenticated sessions.
pub mod session;

/// Polling wait primitives.
pub mod wait;

/// In-memory driver for tests and benchmarks.
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Capture types
pub use capture::{
    CaptureResult, CaptureStatus, CaptureStore, DashboardCapture, PositionLabel, ScrollCapture,
};

// Configuration types
pub use config::{
    BrowserKind, DashboardTarget, NavigationPolicy, RunConfiguration, Selectors, TimingPolicy,
};

// Driver types
pub use driver::{By, Driver, Launcher, launcher_for};

// Error types
pub use error::{Error, Result, Severity};

// Identifier types
pub use identifiers::{RequestId, SessionId};

// Workflow types
pub use orchestrator::{DashboardRunner, RunReport, SkippedDashboard};
pub use render::{PanelReadiness, RenderStage, await_panels_ready};
pub use runner::{QueryOutcome, QueryRunner};
pub use session::Session;
pub use wait::Wait;
