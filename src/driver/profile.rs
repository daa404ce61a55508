//! Throwaway Firefox profiles for automation.
//!
//! Each launched browser gets its own temporary profile directory with a
//! `user.js` that enables the WebDriver BiDi remote agent and silences
//! first-run UI. The directory is deleted when the [`Profile`] drops.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Header comment for `user.js` file.
const USER_JS_HEADER: &str = "// dashboard-capture user.js\n\
                              // Auto-generated preferences for automation\n\n";

// ============================================================================
// PreferenceValue
// ============================================================================

/// A preference value in `user.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i32),
    /// String value.
    String(String),
}

impl PreferenceValue {
    /// Formats the value as a JavaScript literal.
    #[must_use]
    pub fn to_js_literal(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::String(s) => {
                // serde_json string literals are valid JS string literals
                serde_json::Value::String(s.clone()).to_string()
            }
        }
    }
}

impl From<bool> for PreferenceValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PreferenceValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PreferenceValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// ============================================================================
// Preference
// ============================================================================

/// A single `user_pref(...)` entry.
#[derive(Debug, Clone)]
pub struct Preference {
    /// Preference name.
    pub key: &'static str,
    /// Preference value.
    pub value: PreferenceValue,
}

impl Preference {
    /// Creates a preference.
    #[must_use]
    pub fn new(key: &'static str, value: impl Into<PreferenceValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Renders the `user_pref("key", value);` line.
    #[must_use]
    pub fn to_user_pref_line(&self) -> String {
        format!("user_pref(\"{}\", {});", self.key, self.value.to_js_literal())
    }
}

// ============================================================================
// Profile
// ============================================================================

/// A temporary Firefox profile directory.
pub struct Profile {
    dir: TempDir,
}

impl Profile {
    /// Creates a new temporary profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new_temp() -> Result<Self> {
        let dir = TempDir::with_prefix("dashboard-capture-")
            .map_err(|e| Error::config(format!("Failed to create temp profile: {e}")))?;

        debug!(path = %dir.path().display(), "Created temporary profile");
        Ok(Self { dir })
    }

    /// Returns the path to the profile directory.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes preferences to `user.js`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_prefs(&self, prefs: &[Preference]) -> Result<()> {
        let file_path = self.path().join("user.js");

        let mut content = String::from(USER_JS_HEADER);
        for pref in prefs {
            content.push_str(&pref.to_user_pref_line());
            content.push('\n');
        }

        fs::write(&file_path, content)?;

        debug!(
            path = %file_path.display(),
            pref_count = prefs.len(),
            "Wrote preferences to user.js"
        );
        Ok(())
    }

    /// Preferences for a BiDi-driven, prompt-free browser.
    #[must_use]
    pub fn automation_prefs() -> Vec<Preference> {
        vec![
            // 1 = WebDriver BiDi only
            Preference::new("remote.active-protocols", 1),
            Preference::new("remote.prefs.recommended", true),
            Preference::new("browser.startup.page", 0),
            Preference::new("browser.shell.checkDefaultBrowser", false),
            Preference::new("browser.startup.homepage_override.mstone", "ignore"),
            Preference::new("browser.sessionstore.resume_from_crash", false),
            Preference::new("browser.tabs.warnOnClose", false),
            Preference::new("browser.warnOnQuit", false),
            Preference::new("datareporting.policy.dataSubmissionEnabled", false),
            Preference::new("toolkit.telemetry.reportingpolicy.firstRun", false),
            Preference::new("app.update.disabledForTesting", true),
            Preference::new("signon.rememberSignons", false),
        ]
    }
}

// ============================================================================
// Tests
// ============================================================================
