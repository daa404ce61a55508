//! Screenshot naming and persistence.
//!
//! Files are named `<dashboard>_<label>_<YYYYMMDD_HHMMSS>.png`. Two captures
//! of the same dashboard and label within one second map to the same file;
//! the later write wins.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::ImageReader;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ============================================================================
// PositionLabel
// ============================================================================

/// Where in the page a screenshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionLabel {
    /// Unscrolled view.
    Top,
    /// After the n-th scroll step, starting at 1.
    Position(u32),
    /// The single capture of a search query.
    Result,
}

impl fmt::Display for PositionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => f.write_str("top"),
            Self::Position(n) => write!(f, "position_{n}"),
            Self::Result => f.write_str("result"),
        }
    }
}

// ============================================================================
// CaptureResult
// ============================================================================

/// One saved screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// Dashboard display name as configured.
    pub dashboard: String,
    /// Position in the page.
    pub label: PositionLabel,
    /// File written.
    pub path: PathBuf,
    /// Capture time, second granularity in the file name.
    pub captured_at: DateTime<Local>,
    /// Image width and height, when the bytes decode as an image.
    pub dimensions: Option<(u32, u32)>,
}

// ============================================================================
// Naming
// ============================================================================

/// Replaces whitespace and path separators with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Builds the file name for a capture.
#[must_use]
pub fn file_name(dashboard: &str, label: PositionLabel, at: &DateTime<Local>) -> String {
    format!(
        "{}_{}_{}.png",
        sanitize_name(dashboard),
        label,
        at.format(TIMESTAMP_FORMAT)
    )
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// ============================================================================
// CaptureStore
// ============================================================================

/// Output directory for screenshots.
///
/// Shared by concurrent sessions; writes only ever create or replace
/// whole files.
#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: PathBuf,
}

impl CaptureStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Takes a screenshot with `driver` and saves it now.
    ///
    /// # Errors
    ///
    /// Returns the driver's screenshot error or an I/O error.
    pub async fn save(
        &self,
        driver: &dyn Driver,
        dashboard: &str,
        label: PositionLabel,
    ) -> Result<CaptureResult> {
        let bytes = driver.screenshot().await?;
        self.save_at(&bytes, dashboard, label, Local::now()).await
    }

    /// Writes `bytes` as the capture for `dashboard`/`label` at time `at`.
    pub async fn save_at(
        &self,
        bytes: &[u8],
        dashboard: &str,
        label: PositionLabel,
        at: DateTime<Local>,
    ) -> Result<CaptureResult> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(file_name(dashboard, label, &at));
        tokio::fs::write(&path, bytes).await?;

        let dimensions = png_dimensions(bytes);
        if dimensions.is_none() {
            debug!(path = %path.display(), "Screenshot bytes did not decode as an image");
        }
        info!(dashboard, %label, path = %path.display(), "Screenshot saved");

        Ok(CaptureResult {
            dashboard: dashboard.to_string(),
            label,
            path,
            captured_at: at,
            dimensions,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::testing::{FakeDriver, FakePage};

    fn at(secs: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, secs)
            .single()
            .expect("unambiguous time")
    }

    #[test]
    fn test_labels() {
        assert_eq!(PositionLabel::Top.to_string(), "top");
        assert_eq!(PositionLabel::Position(3).to_string(), "position_3");
        assert_eq!(PositionLabel::Result.to_string(), "result");
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            file_name("Ops Overview", PositionLabel::Position(2), &at(7)),
            "Ops_Overview_position_2_20240309_140507.png"
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("a b\tc/d\\e"), "a_b_c_d_e");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_reads_dimensions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CaptureStore::new(temp.path().join("nested/out"));
        let (driver, _) = FakeDriver::new(FakePage::default());

        let result = store
            .save(&driver, "Ops Overview", PositionLabel::Top)
            .await
            .expect("save");

        assert!(result.path.exists());
        assert!(result.path.starts_with(store.dir()));
        assert_eq!(result.dimensions, Some((4, 3)));
        assert_eq!(result.label, PositionLabel::Top);
    }

    #[tokio::test]
    async fn test_same_second_last_write_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CaptureStore::new(temp.path());

        let first = store
            .save_at(b"first", "ops", PositionLabel::Top, at(1))
            .await
            .expect("save");
        let second = store
            .save_at(b"second", "ops", PositionLabel::Top, at(1))
            .await
            .expect("save");

        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read(&second.path).expect("read"), b"second");
        assert_eq!(second.dimensions, None);
    }

    #[tokio::test]
    async fn test_different_seconds_do_not_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CaptureStore::new(temp.path());

        let a = store
            .save_at(b"a", "ops", PositionLabel::Top, at(1))
            .await
            .expect("save");
        let b = store
            .save_at(b"b", "ops", PositionLabel::Top, at(3))
            .await
            .expect("save");

        assert_ne!(a.path, b.path);
        assert_eq!(std::fs::read(&a.path).expect("read"), b"a");
    }

    proptest! {
        #[test]
        fn prop_file_name_is_a_single_component(
            name in "\\PC{1,40}",
            n in 1u32..500,
        ) {
            let file = file_name(&name, PositionLabel::Position(n), &at(0));
            prop_assert!(!file.contains('/'));
            prop_assert!(!file.contains('\\'));
            prop_assert!(!file.chars().any(char::is_whitespace));
            let suffix = format!("_position_{n}_20240309_140500.png");
            prop_assert!(file.ends_with(&suffix));
        }

        #[test]
        fn prop_names_differ_across_seconds(
            name in "[a-zA-Z ]{1,20}",
            offset in 1i64..86_400,
        ) {
            let t0 = at(0);
            let t1 = t0 + ChronoDuration::seconds(offset);
            prop_assert_ne!(
                file_name(&name, PositionLabel::Top, &t0),
                file_name(&name, PositionLabel::Top, &t1)
            );
            prop_assert_eq!(
                file_name(&name, PositionLabel::Top, &t0),
                file_name(&name, PositionLabel::Top, &t0)
            );
        }
    }
}
