//! Screenshot capture.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`storage`] | File naming and persistence of single screenshots |
//! | [`scroll`] | Top-to-bottom scroll capture of one dashboard |

// ============================================================================
// Submodules
// ============================================================================

/// Scroll-and-capture state machine.
pub mod scroll;

/// Screenshot naming and persistence.
pub mod storage;

// ============================================================================
// Re-exports
// ============================================================================

pub use scroll::{CaptureStatus, DashboardCapture, ScrollCapture, ScrollCursor, ScrollState};
pub use storage::{CaptureResult, CaptureStore, PositionLabel, file_name, sanitize_name};
