//! Browser launch options.
//!
//! # Example
//!
//! ```ignore
//! use dashboard_capture::driver::BrowserOptions;
//!
//! let options = BrowserOptions::new()
//!     .with_headless()
//!     .with_window_size(1920, 1080);
//!
//! let args = options.to_args(9222);
//! // ["--remote-debugging-port", "9222", "--headless", "--window-size", "1920,1080"]
//! ```

// ============================================================================
// Constants
// ============================================================================

/// Default window dimensions, matching a full-HD console display.
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1920, 1080);

// ============================================================================
// BrowserOptions
// ============================================================================

/// How a browser is launched and sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Run without a GUI.
    pub headless: bool,

    /// Window and viewport dimensions in pixels (width, height).
    pub window_size: (u32, u32),

    /// Additional command-line arguments.
    pub extra_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BrowserOptions {
    /// Creates options with a visible full-HD window.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            headless: false,
            window_size: DEFAULT_WINDOW_SIZE,
            extra_args: Vec::new(),
        }
    }

    /// Enables headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self) -> Self {
        self.headless = true;
        self
    }

    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl BrowserOptions {
    /// Converts options to Firefox command-line arguments.
    #[must_use]
    pub fn to_args(&self, remote_port: u16) -> Vec<String> {
        let mut args = Vec::with_capacity(5 + self.extra_args.len());

        args.push("--remote-debugging-port".to_string());
        args.push(remote_port.to_string());

        if self.headless {
            args.push("--headless".to_string());
        }

        let (width, height) = self.window_size;
        args.push("--window-size".to_string());
        args.push(format!("{width},{height}"));

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if a dimension is zero.
    pub fn validate(&self) -> Result<(), String> {
        let (width, height) = self.window_size;
        if width == 0 || height == 0 {
            return Err("Window dimensions must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default() {
        let options = BrowserOptions::new();
        assert!(!options.headless);
        assert_eq!(options.window_size, DEFAULT_WINDOW_SIZE);
        assert!(options.extra_args.is_empty());
    }

    #[test]
    fn test_to_args_includes_remote_port() {
        let args = BrowserOptions::new().to_args(9222);
        assert_eq!(args[0], "--remote-debugging-port");
        assert_eq!(args[1], "9222");
        assert!(!args.contains(&"--headless".to_string()));
    }

    #[test]
    fn test_to_args_headless_and_size() {
        let args = BrowserOptions::new()
            .with_headless()
            .with_window_size(800, 600)
            .with_arg("--safe-mode")
            .to_args(4000);

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"800,600".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--safe-mode"));
    }

    #[test]
    fn test_validate_zero_height() {
        let options = BrowserOptions::new().with_window_size(800, 0);
        assert!(options.validate().is_err());
        assert!(BrowserOptions::new().validate().is_ok());
    }
}
