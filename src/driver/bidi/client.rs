//! [`Driver`] implementation over a WebDriver BiDi connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::driver::core::{Driver, ElementRef};
use crate::driver::launcher::ProcessGuard;
use crate::driver::profile::Profile;
use crate::driver::selector::By;
use crate::error::{Error, Result};

use super::connection::Connection;

// ============================================================================
// Resources
// ============================================================================

/// Things released when the driver quits.
struct Resources {
    /// Browser process when this driver launched it.
    process: Option<ProcessGuard>,
    /// Profile directory when this driver launched it.
    _profile: Option<Profile>,
}

// ============================================================================
// BidiDriver
// ============================================================================

/// A browser driven over WebDriver BiDi.
///
/// Bound to the top-level browsing context that existed when the session
/// started.
pub struct BidiDriver {
    connection: Connection,
    context: String,
    resources: Mutex<Option<Resources>>,
}

impl fmt::Debug for BidiDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidiDriver")
            .field("context", &self.context)
            .field("pending", &self.connection.pending_count())
            .finish_non_exhaustive()
    }
}

impl BidiDriver {
    /// Starts a BiDi session and binds to the first top-level context.
    ///
    /// `process` and `profile` are owned by the driver from here on and
    /// released by [`Driver::quit`].
    ///
    /// # Errors
    ///
    /// Returns an error if `session.new` fails or no context exists.
    pub(crate) async fn start(
        connection: Connection,
        window_size: (u32, u32),
        process: Option<ProcessGuard>,
        profile: Option<Profile>,
    ) -> Result<Self> {
        let session = connection
            .send("session.new", json!({ "capabilities": {} }))
            .await?;
        debug!(session_id = %session["sessionId"], "BiDi session started");

        let tree = connection
            .send("browsingContext.getTree", json!({ "maxDepth": 0 }))
            .await?;
        let context = tree["contexts"]
            .get(0)
            .and_then(|c| c["context"].as_str())
            .ok_or_else(|| Error::protocol("No top-level browsing context"))?
            .to_string();

        let (width, height) = window_size;
        connection
            .send(
                "browsingContext.setViewport",
                json!({
                    "context": context,
                    "viewport": { "width": width, "height": height },
                }),
            )
            .await?;

        info!(%context, width, height, "Browsing context ready");

        Ok(Self {
            connection,
            context,
            resources: Mutex::new(Some(Resources {
                process,
                _profile: profile,
            })),
        })
    }

    /// Calls a function declaration in the page with `arguments`.
    async fn call_function(&self, declaration: &str, arguments: Vec<Value>) -> Result<Value> {
        let result = self
            .connection
            .send(
                "script.callFunction",
                json!({
                    "functionDeclaration": declaration,
                    "target": { "context": self.context },
                    "arguments": arguments,
                    "awaitPromise": true,
                    "resultOwnership": "none",
                }),
            )
            .await?;

        match result["type"].as_str() {
            Some("success") => Ok(result["result"].clone()),
            Some("exception") => Err(Error::script_error(
                result["exceptionDetails"]["text"]
                    .as_str()
                    .unwrap_or("uncaught exception"),
            )),
            _ => Err(Error::protocol(format!(
                "Unexpected script result: {result}"
            ))),
        }
    }

    /// Runs `input.performActions` with one input source.
    async fn perform_actions(&self, source: Value) -> Result<()> {
        self.connection
            .send(
                "input.performActions",
                json!({ "context": self.context, "actions": [source] }),
            )
            .await?;
        Ok(())
    }

    async fn locate(&self, by: &By, max: Option<u32>) -> Result<Vec<ElementRef>> {
        let mut params = json!({
            "context": self.context,
            "locator": by.to_bidi_locator(),
        });
        if let Some(max) = max {
            params["maxNodeCount"] = json!(max);
        }

        let result = self
            .connection
            .send("browsingContext.locateNodes", params)
            .await?;

        let nodes = result["nodes"]
            .as_array()
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|node| node["sharedId"].as_str())
                    .map(|id| ElementRef::new(id, by))
                    .collect()
            })
            .unwrap_or_default();

        Ok(nodes)
    }
}

/// Wraps a script body so its return value comes back as JSON text.
fn wrap_script(body: &str) -> String {
    format!(
        "async function() {{\n\
         const __value = await (async () => {{ {body} }})();\n\
         return JSON.stringify(__value === undefined ? null : __value);\n\
         }}"
    )
}

/// Builds the per-character key actions for `text`.
fn key_actions(text: &str) -> Vec<Value> {
    text.chars()
        .flat_map(|c| {
            let key = c.to_string();
            [
                json!({ "type": "keyDown", "value": key }),
                json!({ "type": "keyUp", "value": key }),
            ]
        })
        .collect()
}

// ============================================================================
// BidiDriver - Driver
// ============================================================================

#[async_trait]
impl Driver for BidiDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, context = %self.context, "Navigating");
        self.connection
            .send(
                "browsingContext.navigate",
                json!({ "context": self.context, "url": url, "wait": "complete" }),
            )
            .await?;
        Ok(())
    }

    async fn find_element(&self, by: &By) -> Result<ElementRef> {
        self.locate(by, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::element_not_found(by.to_string()))
    }

    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>> {
        self.locate(by, None).await
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        debug!(element = element.locator(), len = text.len(), "Sending keys");
        self.call_function(
            "function(el) { el.focus(); }",
            vec![json!({ "sharedId": element.id() })],
        )
        .await?;

        self.perform_actions(json!({
            "type": "key",
            "id": "keyboard",
            "actions": key_actions(text),
        }))
        .await
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        debug!(element = element.locator(), "Clicking");
        self.perform_actions(json!({
            "type": "pointer",
            "id": "mouse",
            "parameters": { "pointerType": "mouse" },
            "actions": [
                {
                    "type": "pointerMove",
                    "x": 0,
                    "y": 0,
                    "origin": { "type": "element", "element": { "sharedId": element.id() } },
                },
                { "type": "pointerDown", "button": 0 },
                { "type": "pointerUp", "button": 0 },
            ],
        }))
        .await
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        let result = self.call_function(&wrap_script(script), Vec::new()).await?;
        let text = result["value"]
            .as_str()
            .ok_or_else(|| Error::script_error(format!("Non-string script result: {result}")))?;
        Ok(serde_json::from_str(text)?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let result = self
            .connection
            .send(
                "browsingContext.captureScreenshot",
                json!({ "context": self.context, "origin": "viewport" }),
            )
            .await?;

        let data = result["data"]
            .as_str()
            .ok_or_else(|| Error::protocol("Screenshot response missing data field"))?;

        Base64Standard
            .decode(data)
            .map_err(|e| Error::protocol(format!("Failed to decode base64: {e}")))
    }

    async fn quit(&self) -> Result<()> {
        let Some(resources) = self.resources.lock().take() else {
            debug!(context = %self.context, "Driver already released");
            return Ok(());
        };

        if let Err(e) = self.connection.send("session.end", json!({})).await {
            debug!(error = %e, "session.end failed; closing anyway");
        }
        self.connection.shutdown();

        if let Some(mut process) = resources.process {
            process.kill().await;
        }

        info!(context = %self.context, "Driver released");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
