//! Concurrent search-query runner.
//!
//! Each query runs as its own tokio task with its own launched driver and
//! session: login, open the search page, submit the query, wait, capture
//! one screenshot, release. Units share nothing but the configuration
//! (read-only) and the output directory. [`QueryRunner::run_all`] awaits
//! every unit and returns one [`QueryOutcome`] per query, in input order,
//! failures included.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::capture::{CaptureResult, CaptureStore, PositionLabel};
use crate::config::RunConfiguration;
use crate::driver::{By, Driver, Launcher};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::wait::Wait;

// ============================================================================
// QueryOutcome
// ============================================================================

/// Result of one query unit.
#[derive(Debug)]
pub struct QueryOutcome {
    /// 1-based position in the input.
    pub number: usize,
    /// Query text.
    pub query: String,
    /// The capture, or why the unit failed.
    pub result: Result<CaptureResult>,
}

impl QueryOutcome {
    /// Returns `true` if the unit produced a capture.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

// ============================================================================
// QueryRunner
// ============================================================================

/// Fans queries out to independent sessions.
pub struct QueryRunner {
    config: Arc<RunConfiguration>,
    launcher: Arc<dyn Launcher>,
    store: CaptureStore,
}

impl QueryRunner {
    /// Creates a runner writing to the configured `screenshot_dir`.
    #[must_use]
    pub fn new(config: Arc<RunConfiguration>, launcher: Arc<dyn Launcher>) -> Self {
        let store = CaptureStore::new(&config.screenshot_dir);
        Self {
            config,
            launcher,
            store,
        }
    }

    /// Runs the configured `queries`.
    pub async fn run_configured(&self) -> Vec<QueryOutcome> {
        let queries = self.config.queries.clone();
        self.run_all(&queries).await
    }

    /// Runs every query concurrently and waits for all of them.
    ///
    /// Never short-circuits: a failed or panicked unit is reported in its
    /// outcome while the others run to completion.
    pub async fn run_all(&self, queries: &[String]) -> Vec<QueryOutcome> {
        info!(queries = queries.len(), "Starting concurrent query run");

        let handles: Vec<(usize, String, JoinHandle<Result<CaptureResult>>)> = queries
            .iter()
            .enumerate()
            .map(|(i, query)| {
                let number = i + 1;
                let unit = QueryUnit {
                    config: Arc::clone(&self.config),
                    launcher: Arc::clone(&self.launcher),
                    store: self.store.clone(),
                    number,
                    query: query.clone(),
                };
                (number, query.clone(), tokio::spawn(unit.run()))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (number, query, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join) => Err(Error::task_failed(format!("query {number}: {join}"))),
            };

            match &result {
                Ok(capture) => {
                    info!(number, path = %capture.path.display(), "Query captured");
                }
                Err(e) => error!(number, %query, error = %e, "Query failed"),
            }
            outcomes.push(QueryOutcome {
                number,
                query,
                result,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(total = outcomes.len(), failed, "Concurrent query run finished");
        outcomes
    }
}

// ============================================================================
// QueryUnit
// ============================================================================

/// Everything one spawned unit owns.
struct QueryUnit {
    config: Arc<RunConfiguration>,
    launcher: Arc<dyn Launcher>,
    store: CaptureStore,
    number: usize,
    query: String,
}

impl QueryUnit {
    async fn run(self) -> Result<CaptureResult> {
        let driver = self.launcher.launch().await?;
        let session = Session::login(driver, &self.config).await?;

        let result = self.search_and_capture(&session).await;

        if let Err(e) = session.close().await {
            warn!(number = self.number, error = %e, "Driver did not quit cleanly");
        }
        result
    }

    async fn search_and_capture(&self, session: &Session) -> Result<CaptureResult> {
        let driver = session.driver();
        let selectors = session.selectors();
        let timing = session.timing();

        let url = self.config.search_url()?;
        info!(session_id = %session.id(), number = self.number, "Opening search page");
        driver
            .navigate(&url)
            .await
            .map_err(|e| Error::navigation(&url, e.to_string()))?;

        Wait::new(timing.page_load_timeout, timing.poll_interval)
            .for_element(driver, &selectors.search_bar)
            .await
            .map_err(|e| Error::navigation(&url, e.to_string()))?;

        enter_query(driver, &selectors.search_bar, &self.query).await?;
        sleep(timing.query_input_settle).await;

        let button = driver.find_element(&selectors.search_button).await?;
        driver.click(&button).await?;

        sleep(timing.query_result_wait).await;

        self.store
            .save(driver, &format!("query_{}", self.number), PositionLabel::Result)
            .await
    }
}

/// Puts `query` into the search bar.
///
/// CSS locators are filled by assigning the element's value, with both the
/// selector and the query passed as JSON string literals. Other locator
/// strategies fall back to typing.
async fn enter_query(driver: &dyn Driver, search_bar: &By, query: &str) -> Result<()> {
    match search_bar {
        By::Css(css) => {
            let script = set_value_script(css, query)?;
            driver.execute_script(&script).await?;
        }
        other => {
            let element = driver.find_element(other).await?;
            driver.send_keys(&element, query).await?;
        }
    }
    Ok(())
}

fn set_value_script(css: &str, value: &str) -> Result<String> {
    Ok(format!(
        "document.querySelector({}).value = {};",
        serde_json::to_string(css)?,
        serde_json::to_string(value)?
    ))
}

// ============================================================================
// Tests
// ============================================================================
