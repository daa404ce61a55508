//! Fan-out benchmark suite over in-memory drivers.
//!
//! Measures runner overhead without a browser:
//! - Concurrent query units: 5, 25, 100
//! - Sequential scroll capture of pages 5, 20 and 50 viewports tall
//!
//! Run with: cargo bench --bench concurrent_queries --features test-util
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;
use tokio::runtime::Runtime;

use dashboard_capture::testing::{FakeLauncher, FakePage};
use dashboard_capture::{DashboardRunner, QueryRunner, RunConfiguration};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const QUERY_COUNTS: &[usize] = &[5, 25, 100];
const PAGE_HEIGHTS: &[u32] = &[5, 20, 50];

const VIEWPORT: f64 = 1000.0;

// ============================================================================
// Configuration
// ============================================================================

fn config(dir: &TempDir) -> Arc<RunConfiguration> {
    let yaml = format!(
        r#"
console_url: https://console.bench
username: bench
password: bench
screenshot_dir: {dir}
page_load_wait: 1
panel_load_wait: 1
scroll_pause_time: 0
visualization_render_wait: 0
poll_interval: 0
query_input_wait: 0
query_result_wait: 0
dashboards:
  - name: Bench
    url: https://console.bench/app/bench
"#,
        dir = dir.path().display()
    );
    Arc::new(RunConfiguration::from_yaml(&yaml).expect("bench configuration"))
}

// ============================================================================
// Benchmark: Concurrent Queries
// ============================================================================

fn bench_query_fan_out(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let dir = TempDir::new().expect("tempdir");
    let config = config(&dir);

    let mut group = c.benchmark_group("query_fan_out");

    for &count in QUERY_COUNTS {
        let queries: Vec<String> = (0..count).map(|i| format!("index=main | head {i}")).collect();
        group.bench_with_input(BenchmarkId::new("queries", count), &queries, |b, queries| {
            b.to_async(&rt).iter(|| async {
                let launcher = Arc::new(FakeLauncher::repeating(FakePage::default()));
                let outcomes = QueryRunner::new(Arc::clone(&config), launcher)
                    .run_all(queries)
                    .await;
                assert!(outcomes.iter().all(|o| o.is_success()));
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Scroll Capture
// ============================================================================

fn bench_scroll_capture(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let dir = TempDir::new().expect("tempdir");
    let config = config(&dir);

    let mut group = c.benchmark_group("scroll_capture");
    group.sample_size(20);

    for &pages in PAGE_HEIGHTS {
        group.bench_with_input(BenchmarkId::new("viewports", pages), &pages, |b, &pages| {
            b.to_async(&rt).iter(|| async {
                let page = FakePage::new(f64::from(pages) * VIEWPORT, VIEWPORT);
                let launcher = Arc::new(FakeLauncher::repeating(page));
                let report = DashboardRunner::new(Arc::clone(&config), launcher)
                    .run()
                    .await
                    .expect("run");
                assert_eq!(report.total_captures(), pages as usize);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_query_fan_out, bench_scroll_capture);
criterion_main!(benches);
