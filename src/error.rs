//! Error types for dashboard capture.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use dashboard_capture::{Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     session.navigate_and_wait("https://console.example.com/app/ops").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::BrowserNotFound`], [`Error::ProcessLaunchFailed`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::RequestTimeout`] |
//! | Driver | [`Error::ElementNotFound`], [`Error::ScriptError`] |
//! | Workflow | [`Error::Authentication`], [`Error::Navigation`], [`Error::WaitTimeout`] |
//! | Runner | [`Error::TaskFailed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Yaml`], [`Error::Url`], [`Error::WebSocket`] |
//!
//! # Severity
//!
//! Only [`Error::WaitTimeout`] is [`Severity::Recoverable`]: the render-wait
//! engine absorbs it and capture proceeds with whatever has rendered. Every
//! other variant is [`Severity::Fatal`] to the unit of work that raised it.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Severity
// ============================================================================

/// Whether a failure is absorbed locally or aborts the affected unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged and absorbed; the workflow continues.
    Recoverable,
    /// Aborts the session or query that raised it.
    Fatal,
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the run configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Browser binary not found at path.
    #[error("Browser not found at: {path}")]
    BrowserNotFound {
        /// Path where the browser was expected.
        path: PathBuf,
    },

    /// Failed to launch the browser process.
    #[error("Failed to launch browser: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the browser's remote agent.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or error response from the remote end.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// Element not found by locator.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Locator used, as `strategy:value`.
        selector: String,
    },

    /// JavaScript execution error.
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message from script execution.
        message: String,
    },

    // ========================================================================
    // Workflow Errors
    // ========================================================================
    /// Login landmark never appeared.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the failure.
        message: String,
    },

    /// Dashboard landmark never appeared after navigation.
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Polled condition not satisfied in time.
    #[error("Timeout after {timeout_ms}ms waiting for {condition}")]
    WaitTimeout {
        /// Description of the awaited condition.
        condition: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Runner Errors
    // ========================================================================
    /// A concurrent unit panicked or was cancelled.
    #[error("Task failed: {message}")]
    TaskFailed {
        /// Description of the join failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a browser not found error.
    #[inline]
    pub fn browser_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BrowserNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[inline]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a navigation error.
    #[inline]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a wait timeout error.
    #[inline]
    pub fn wait_timeout(condition: impl Into<String>, timeout_ms: u64) -> Self {
        Self::WaitTimeout {
            condition: condition.into(),
            timeout_ms,
        }
    }

    /// Creates a task failed error.
    #[inline]
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns how the workflow treats this error.
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::WaitTimeout { .. } => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. } | Self::WaitTimeout { .. }
        )
    }

    /// Returns `true` if the automation driver itself failed.
    #[inline]
    #[must_use]
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::ScriptError { .. }
                | Self::Protocol { .. }
                | Self::RequestTimeout { .. }
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::navigation("https://console/app/ops", "landmark missing");
        assert_eq!(
            err.to_string(),
            "Navigation to https://console/app/ops failed: landmark missing"
        );
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing console_url");
        assert_eq!(err.to_string(), "Configuration error: missing console_url");
    }

    #[test]
    fn test_only_wait_timeout_is_recoverable() {
        assert_eq!(
            Error::wait_timeout("panels", 10_000).severity(),
            Severity::Recoverable
        );
        assert_eq!(Error::authentication("x").severity(), Severity::Fatal);
        assert_eq!(Error::navigation("u", "x").severity(), Severity::Fatal);
        assert_eq!(Error::element_not_found("id:x").severity(), Severity::Fatal);
        assert_eq!(Error::ConnectionClosed.severity(), Severity::Fatal);
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::wait_timeout("x", 1).is_timeout());
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(!Error::connection("test").is_timeout());
    }

    #[test]
    fn test_is_driver_error() {
        assert!(Error::element_not_found("css:#a").is_driver_error());
        assert!(Error::script_error("boom").is_driver_error());
        assert!(Error::ConnectionClosed.is_driver_error());
        assert!(!Error::authentication("x").is_driver_error());
        assert!(!Error::wait_timeout("x", 1).is_driver_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{not: a list}").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
