//! Element locator strategies.
//!
//! Provides Selenium-like `By` locators. Configuration files spell them as
//! `{ strategy, value }` maps:
//!
//! ```yaml
//! username: { strategy: id, value: username }
//! panel: { strategy: css, value: .dashboard-panel }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ============================================================================
// By Enum
// ============================================================================

/// Element locator strategy (like Selenium's `By`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value")]
pub enum By {
    /// CSS selector (most common).
    #[serde(rename = "css")]
    Css(String),

    /// XPath expression.
    #[serde(rename = "xpath")]
    XPath(String),

    /// Element ID.
    #[serde(rename = "id")]
    Id(String),

    /// Name attribute.
    #[serde(rename = "name")]
    Name(String),

    /// Class name (single class).
    #[serde(rename = "class")]
    Class(String),

    /// Tag name.
    #[serde(rename = "tag")]
    Tag(String),

    /// Exact rendered text match.
    #[serde(rename = "text")]
    Text(String),

    /// Partial rendered text match.
    #[serde(rename = "partialText")]
    PartialText(String),
}

impl By {
    /// Creates a CSS selector.
    #[inline]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an XPath selector.
    #[inline]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Creates an ID selector.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a name attribute selector.
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a class name selector.
    #[inline]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Creates a tag name selector.
    #[inline]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    /// Creates a text content selector.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a partial text content selector.
    #[inline]
    pub fn partial_text(text: impl Into<String>) -> Self {
        Self::PartialText(text.into())
    }

    /// Returns the strategy name.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::Name(_) => "name",
            Self::Class(_) => "class",
            Self::Tag(_) => "tag",
            Self::Text(_) => "text",
            Self::PartialText(_) => "partialText",
        }
    }

    /// Returns the selector value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v)
            | Self::XPath(v)
            | Self::Id(v)
            | Self::Name(v)
            | Self::Class(v)
            | Self::Tag(v)
            | Self::Text(v)
            | Self::PartialText(v) => v,
        }
    }

    /// Converts to a WebDriver BiDi `browsingContext.Locator`.
    ///
    /// BiDi only knows css, xpath and innerText, so the attribute
    /// strategies are rewritten as CSS.
    #[must_use]
    pub fn to_bidi_locator(&self) -> Value {
        match self {
            Self::Css(v) | Self::Tag(v) => json!({ "type": "css", "value": v }),
            Self::XPath(v) => json!({ "type": "xpath", "value": v }),
            Self::Id(v) => json!({ "type": "css", "value": attribute_selector("id", v) }),
            Self::Name(v) => json!({ "type": "css", "value": attribute_selector("name", v) }),
            Self::Class(v) => json!({ "type": "css", "value": format!(".{v}") }),
            Self::Text(v) => json!({ "type": "innerText", "value": v, "matchType": "full" }),
            Self::PartialText(v) => {
                json!({ "type": "innerText", "value": v, "matchType": "partial" })
            }
        }
    }
}

/// Builds `[name="value"]` with the value quoted for CSS.
fn attribute_selector(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{name}=\"{escaped}\"]")
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

// ============================================================================
// From implementations for ergonomics
// ============================================================================

impl From<&str> for By {
    /// Converts a string to CSS selector (default).
    fn from(s: &str) -> Self {
        Self::Css(s.to_string())
    }
}

impl From<String> for By {
    /// Converts a string to CSS selector (default).
    fn from(s: String) -> Self {
        Self::Css(s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_css() {
        let by = By::css(".dashboard-panel");
        assert_eq!(by.strategy(), "css");
        assert_eq!(by.value(), ".dashboard-panel");
    }

    #[test]
    fn test_display() {
        assert_eq!(By::id("username").to_string(), "id:username");
    }

    #[test]
    fn test_from_str() {
        let by: By = "#login".into();
        assert!(matches!(by, By::Css(_)));
    }

    #[test]
    fn test_yaml_form() {
        let by: By = serde_yaml::from_str("{ strategy: id, value: dashboard-body }").expect("parse");
        assert_eq!(by, By::id("dashboard-body"));
    }

    #[test]
    fn test_id_locator_is_quoted_css() {
        let locator = By::id("a\"b").to_bidi_locator();
        assert_eq!(locator["type"], "css");
        assert_eq!(locator["value"], "[id=\"a\\\"b\"]");
    }

    #[test]
    fn test_text_locators_use_inner_text() {
        let full = By::text("Search").to_bidi_locator();
        assert_eq!(full["type"], "innerText");
        assert_eq!(full["matchType"], "full");

        let partial = By::partial_text("Sea").to_bidi_locator();
        assert_eq!(partial["matchType"], "partial");
    }
}
