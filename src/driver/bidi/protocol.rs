//! WebDriver BiDi message types.
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`Request`] | Local → Remote | `{ id, method, params }` |
//! | [`Message::Success`] | Remote → Local | `{ type: "success", id, result }` |
//! | [`Message::Error`] | Remote → Local | `{ type: "error", id, error, message }` |
//! | [`Message::Event`] | Remote → Local | `{ type: "event", method, params }` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::identifiers::RequestId;

// ============================================================================
// Request
// ============================================================================

/// A command sent to the remote end.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation id.
    pub id: RequestId,
    /// Command name in `module.command` form.
    pub method: String,
    /// Command parameters.
    pub params: Value,
}

impl Request {
    /// Creates a new request with a fresh id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// Any message received from the remote end.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Successful command result.
    Success {
        /// Matches the request `id`.
        id: RequestId,
        /// Command result.
        #[serde(default)]
        result: Value,
    },

    /// Failed command, or a message the remote end could not parse.
    Error {
        /// Matches the request `id`; absent when the request was unreadable.
        #[serde(default)]
        id: Option<RequestId>,
        /// Error code, e.g. `no such element`.
        error: String,
        /// Human-readable message.
        #[serde(default)]
        message: String,
    },

    /// Asynchronous event.
    Event {
        /// Event name.
        method: String,
        /// Event payload.
        #[serde(default)]
        params: Value,
    },
}

/// Maps a BiDi error code to the crate error taxonomy.
#[must_use]
pub fn remote_error(code: &str, message: &str) -> Error {
    match code {
        "no such element" | "no such node" | "stale element reference" => {
            Error::element_not_found(message)
        }
        "javascript error" => Error::script_error(message),
        _ => Error::protocol(format!("{code}: {message}")),
    }
}

// ============================================================================
// Tests
// ============================================================================
