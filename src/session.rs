//! Authenticated browser sessions.
//!
//! A [`Session`] exclusively owns one [`Driver`]. It is created by
//! [`Session::login`] and released by [`Session::close`], which consumes it.
//! A failed login releases the driver before returning, so on every path
//! the driver's `quit` runs exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{RunConfiguration, Selectors, TimingPolicy};
use crate::driver::{By, Driver};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::wait::Wait;

// ============================================================================
// Session
// ============================================================================

/// One logged-in browser.
pub struct Session {
    id: SessionId,
    driver: Box<dyn Driver>,
    timing: TimingPolicy,
    selectors: Selectors,
    authenticated: bool,
    released: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authenticated", &self.authenticated)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Logs in to the console with `driver`.
    ///
    /// Navigates to `console_url`, waits for the login form, fills in the
    /// credentials, submits, and waits for the post-login landmark. Both
    /// waits are bounded by `page_load_wait`.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`] if the form or the landmark never appears
    /// - any driver error raised while filling in the form
    ///
    /// The driver has been released whenever this returns an error.
    pub async fn login(driver: Box<dyn Driver>, config: &RunConfiguration) -> Result<Self> {
        let mut session = Self {
            id: SessionId::next(),
            driver,
            timing: config.timing,
            selectors: config.selectors.clone(),
            authenticated: false,
            released: false,
        };

        info!(session_id = %session.id, url = %config.console_url, "Logging in");

        match session.authenticate(config).await {
            Ok(()) => {
                session.authenticated = true;
                info!(session_id = %session.id, "Login successful");
                Ok(session)
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Login failed; releasing driver");
                if let Err(release) = session.release().await {
                    debug!(session_id = %session.id, error = %release, "Release after failed login");
                }
                Err(e)
            }
        }
    }

    async fn authenticate(&self, config: &RunConfiguration) -> Result<()> {
        let driver = self.driver.as_ref();
        driver.navigate(&config.console_url).await?;

        self.page_wait()
            .for_element(driver, &self.selectors.username)
            .await
            .map_err(|e| not_visible(e, "login form", &self.selectors.username))?;

        let username = driver.find_element(&self.selectors.username).await?;
        driver.send_keys(&username, &config.username).await?;

        let password = driver.find_element(&self.selectors.password).await?;
        driver.send_keys(&password, config.password.expose()).await?;

        let submit = driver.find_element(&self.selectors.submit).await?;
        driver.click(&submit).await?;

        self.page_wait()
            .for_element(driver, &self.selectors.login_landmark)
            .await
            .map_err(|e| not_visible(e, "landmark", &self.selectors.login_landmark))
    }

    /// Navigates to `url` and waits for the dashboard landmark.
    ///
    /// # Errors
    ///
    /// [`Error::Navigation`] if the navigation fails or the landmark does
    /// not appear within `page_load_wait`.
    pub async fn navigate_and_wait(&self, url: &str) -> Result<()> {
        info!(session_id = %self.id, url, "Navigating");

        self.driver
            .navigate(url)
            .await
            .map_err(|e| Error::navigation(url, e.to_string()))?;

        self.page_wait()
            .for_element(self.driver.as_ref(), &self.selectors.dashboard_landmark)
            .await
            .map_err(|e| {
                warn!(session_id = %self.id, url, error = %e, "Dashboard did not load");
                Error::navigation(url, e.to_string())
            })
    }

    /// Releases the driver.
    ///
    /// # Errors
    ///
    /// Returns the driver's `quit` error; the session is consumed either way.
    pub async fn close(mut self) -> Result<()> {
        self.release().await
    }

    async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!(session_id = %self.id, "Releasing driver");
        self.driver.quit().await
    }

    fn page_wait(&self) -> Wait {
        Wait::new(self.timing.page_load_timeout, self.timing.poll_interval)
    }

    /// Session identifier, for logs.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The owned driver.
    #[inline]
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Timing policy in effect.
    #[inline]
    #[must_use]
    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    /// Locators in effect.
    #[inline]
    #[must_use]
    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    /// Returns `true` once login has succeeded.
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Turns a login-phase wait timeout into [`Error::Authentication`].
fn not_visible(error: Error, what: &str, by: &By) -> Error {
    match error {
        Error::WaitTimeout { timeout_ms, .. } => {
            Error::authentication(format!("{what} {by} not visible after {timeout_ms}ms"))
        }
        other => other,
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.released {
            warn!(session_id = %self.id, "Session dropped without close; driver not quit");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::testing::{FakeDriver, FakePage};

    #[tokio::test(start_paused = true)]
    async fn test_login_success_then_close_quits_once() {
        let config = RunConfiguration::for_tests();
        let (driver, handle) = FakeDriver::new(FakePage::default());

        let session = Session::login(Box::new(driver), &config)
            .await
            .expect("login");
        assert!(session.is_authenticated());
        assert_eq!(handle.quit_count(), 0);

        session.close().await.expect("close");
        assert_eq!(handle.quit_count(), 1);

        let actions = handle.actions();
        assert_eq!(actions[0], "navigate https://console.test");
        assert_eq!(actions[1], "keys id:username tester");
        assert_eq!(actions[2], "keys id:password secret");
        assert!(actions[3].starts_with("click css:input"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_landmark_is_authentication_error() {
        let config = RunConfiguration::for_tests();
        let page = FakePage::default().without(&config.selectors.login_landmark);
        let (driver, handle) = FakeDriver::new(page);

        let start = Instant::now();
        let result = Session::login(Box::new(driver), &config).await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(handle.quit_count(), 1);
        assert_eq!(start.elapsed(), config.timing.page_load_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_waits_for_late_form() {
        let config = RunConfiguration::for_tests();
        let page = FakePage::default()
            .with_delayed(config.selectors.username.clone(), Duration::from_secs(3));
        let (driver, handle) = FakeDriver::new(page);

        let start = Instant::now();
        let session = Session::login(Box::new(driver), &config)
            .await
            .expect("login");

        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < config.timing.page_load_timeout);
        assert_eq!(handle.actions()[1], "keys id:username tester");
        session.close().await.expect("close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_login_form_is_bounded_authentication_error() {
        let config = RunConfiguration::for_tests();
        let page = FakePage::default().without(&config.selectors.username);
        let (driver, handle) = FakeDriver::new(page);

        let start = Instant::now();
        let result = Session::login(Box::new(driver), &config).await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(start.elapsed(), config.timing.page_load_timeout);
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_error_during_login_releases() {
        let config = RunConfiguration::for_tests();
        let page = FakePage::default().without(&config.selectors.password);
        let (driver, handle) = FakeDriver::new(page);

        let result = Session::login(Box::new(driver), &config).await;

        assert!(result.expect_err("no password field").is_driver_error());
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_then_close_quits_once() {
        let config = RunConfiguration::for_tests();
        let page = FakePage::default().without(&config.selectors.dashboard_landmark);
        let (driver, handle) = FakeDriver::new(page);

        let session = Session::login(Box::new(driver), &config)
            .await
            .expect("login");
        let result = session.navigate_and_wait("https://console.test/app/ops").await;

        assert!(matches!(result, Err(Error::Navigation { ref url, .. }) if url == "https://console.test/app/ops"));
        session.close().await.expect("close");
        assert_eq!(handle.quit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_and_wait_sets_current_page() {
        let config = RunConfiguration::for_tests();
        let (driver, handle) = FakeDriver::new(FakePage::default());

        let session = Session::login(Box::new(driver), &config)
            .await
            .expect("login");
        session
            .navigate_and_wait("https://console.test/app/ops")
            .await
            .expect("navigate");

        assert_eq!(
            handle.actions().last().map(String::as_str),
            Some("navigate https://console.test/app/ops")
        );
        session.close().await.expect("close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_failure_on_navigate_is_navigation_error() {
        let config = RunConfiguration::for_tests();
        let (driver, handle) = FakeDriver::new(FakePage::default().failing_on("navigate"));
        let session = Session {
            id: SessionId::next(),
            driver: Box::new(driver),
            timing: config.timing,
            selectors: config.selectors.clone(),
            authenticated: true,
            released: false,
        };

        let result = session.navigate_and_wait("https://console.test/x").await;
        assert!(matches!(result, Err(Error::Navigation { .. })));

        session.close().await.expect("close");
        assert_eq!(handle.quit_count(), 1);
    }
}
