//! `dashcap` - capture dashboards or search queries from the command line.
//!
//! ```text
//! dashcap [--debug] dashboards --config config.yaml
//! dashcap [--debug] queries --config config.yaml
//! ```
//!
//! Exits with status 1 on any unrecovered error, or in `queries` mode when
//! any query failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dashboard_capture::{
    CaptureStatus, DashboardRunner, QueryRunner, Result, RunConfiguration, launcher_for,
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "dashcap", version, about, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scroll through every configured dashboard with one session.
    Dashboards {
        /// Path to the YAML configuration.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run every configured search query concurrently, one session each.
    Queries {
        /// Path to the YAML configuration.
        #[arg(short, long)]
        config: PathBuf,
    },
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "dashboard_capture=debug,dashcap=debug"
    } else {
        "dashboard_capture=info,dashcap=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run_dashboards(config: Arc<RunConfiguration>) -> Result<bool> {
    let launcher = launcher_for(&config)?;
    let report = DashboardRunner::new(config, launcher).run().await?;

    for capture in &report.dashboards {
        if capture.status == CaptureStatus::Incomplete {
            warn!(dashboard = %capture.dashboard, "Capture stopped before the end of the page");
        }
    }
    for skipped in &report.skipped {
        warn!(dashboard = %skipped.name, reason = %skipped.reason, "Dashboard skipped");
    }
    info!(screens = report.total_captures(), "All dashboards processed");
    Ok(true)
}

async fn run_queries(config: Arc<RunConfiguration>) -> Result<bool> {
    let launcher = launcher_for(&config)?;
    let outcomes = QueryRunner::new(config, launcher).run_configured().await;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        error!(failed, total = outcomes.len(), "Some queries failed");
    } else {
        info!(total = outcomes.len(), "All queries executed and screenshots saved");
    }
    Ok(failed == 0)
}

async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Dashboards { config } => {
            run_dashboards(Arc::new(RunConfiguration::load(config)?)).await
        }
        Command::Queries { config } => {
            run_queries(Arc::new(RunConfiguration::load(config)?)).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
