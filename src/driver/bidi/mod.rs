//! WebDriver BiDi backend.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `protocol` | Request and incoming message types |
//! | `connection` | WebSocket event loop with request correlation |
//! | `client` | [`BidiDriver`], the [`Driver`](crate::driver::Driver) implementation |

// ============================================================================
// Submodules
// ============================================================================

mod client;
mod connection;
mod protocol;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::BidiDriver;
pub use connection::Connection;
pub use protocol::{Message, Request};
