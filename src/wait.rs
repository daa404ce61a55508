//! Polling wait primitives.
//!
//! A [`Wait`] polls a probe until it reports `true` or the timeout elapses.
//! Probe errors (an element detached mid-query, a script racing a page
//! load) count as "not yet satisfied" and polling continues. Expiry yields
//! [`Error::WaitTimeout`]; callers decide whether that is fatal.
//!
//! Every probe call is itself bounded by the deadline, so a wait never
//! outlives its timeout by more than one scheduler tick.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::trace;

use crate::driver::{By, Driver};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Floor for the poll interval so a zero interval cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Wait
// ============================================================================

/// A timeout and poll interval pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    timeout: Duration,
    poll_interval: Duration,
}

impl Wait {
    /// Creates a wait bounded by `timeout`, polling every `poll_interval`.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// The bound.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Polls `probe` until it returns `Ok(true)`.
    ///
    /// The probe runs at least once, even with a zero timeout.
    ///
    /// # Errors
    ///
    /// [`Error::WaitTimeout`] naming `condition` once the timeout elapses.
    pub async fn until<F, Fut>(&self, condition: &str, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match timeout_at(deadline, probe()).await {
                Ok(Ok(true)) => {
                    trace!(condition, attempts, "Wait satisfied");
                    return Ok(());
                }
                Ok(Ok(false)) => {}
                Ok(Err(e)) => trace!(condition, attempts, error = %e, "Probe failed; retrying"),
                Err(_) => break,
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }

        Err(Error::wait_timeout(
            condition,
            self.timeout.as_millis() as u64,
        ))
    }

    /// Waits for at least one element matching `by`.
    pub async fn for_element(&self, driver: &dyn Driver, by: &By) -> Result<()> {
        self.for_count(driver, by, 1).await
    }

    /// Waits for at least `count` elements matching `by`.
    pub async fn for_count(&self, driver: &dyn Driver, by: &By, count: usize) -> Result<()> {
        let condition = format!("{count} x {by}");
        self.until(&condition, || async move {
            Ok::<_, Error>(driver.find_elements(by).await?.len() >= count)
        })
        .await
    }

    /// Waits until nothing matches `by`.
    ///
    /// Satisfied immediately when the element never appears.
    pub async fn for_absence(&self, driver: &dyn Driver, by: &By) -> Result<()> {
        let condition = format!("absence of {by}");
        self.until(&condition, || async move {
            Ok::<_, Error>(driver.find_elements(by).await?.is_empty())
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::testing::{FakeDriver, FakePage, Loading};

    fn wait(secs: u64) -> Wait {
        Wait::new(Duration::from_secs(secs), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_times_out_at_bound() {
        let start = Instant::now();
        let result = wait(3).until("never", || async { Ok(false) }).await;

        assert!(matches!(
            result,
            Err(Error::WaitTimeout { timeout_ms: 3000, .. })
        ));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_are_not_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = wait(5)
            .until("third time lucky", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::element_not_found("css:.x"))
                    } else {
                        Ok(true)
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_probes_once() {
        let result = Wait::new(Duration::ZERO, Duration::ZERO)
            .until("ready", || async { Ok(true) })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_cut_off() {
        let start = Instant::now();
        let result = wait(2)
            .until("hangs", || async {
                sleep(Duration::from_secs(3600)).await;
                Ok(true)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_for_element_waits_for_late_panels() {
        let page = FakePage::default().with_panels(2, Duration::from_secs(4));
        let panel = page.selectors.panel.clone();
        let (driver, _) = FakeDriver::new(page);

        let start = Instant::now();
        wait(10).for_element(&driver, &panel).await.expect("panels");
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_for_count() {
        let page = FakePage::default().with_panels(2, Duration::ZERO);
        let panel = page.selectors.panel.clone();
        let (driver, _) = FakeDriver::new(page);

        assert!(wait(1).for_count(&driver, &panel, 2).await.is_ok());
        assert!(wait(1).for_count(&driver, &panel, 3).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_for_absence_passes_when_never_present() {
        let page = FakePage::default().with_loading(Loading::Never);
        let loading = page.selectors.loading_indicator.clone();
        let (driver, _) = FakeDriver::new(page);

        let start = Instant::now();
        wait(10).for_absence(&driver, &loading).await.expect("absent");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_for_absence_times_out_on_stuck_indicator() {
        let page = FakePage::default().with_loading(Loading::Forever);
        let loading = page.selectors.loading_indicator.clone();
        let (driver, _) = FakeDriver::new(page);

        let result = wait(10).for_absence(&driver, &loading).await;
        assert!(result.expect_err("stuck").is_timeout());
    }
}
