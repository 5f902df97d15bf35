// =====================================================
// APS INTEGRATION
// Oracle ERP → SQL Server APS replace-load pipeline
// =====================================================

pub mod config;
pub mod db_types;
pub mod error;
pub mod logging;
pub mod mssql;
pub mod oracle;
pub mod pipeline;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::mssql::MssqlDestination;
use crate::oracle::OracleSource;
use crate::pipeline::{ControllerSettings, PipelineController, RunState};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "aps-integration",
    version,
    about = "Loads Oracle extraction results into SQL Server and copies the schedule back"
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "APS_INTEGRATION_CONFIG", default_value = "aps-integration.json")]
    pub config: PathBuf,

    /// Log filter, e.g. `info` or `aps_integration_lib=debug`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run again every N seconds instead of once.
    #[arg(long)]
    pub interval_seconds: Option<u64>,
}

/// Runs the pipeline once, or on a fixed interval until interrupted.
/// Returns the final state of the last run.
pub async fn run(cli: Cli) -> Result<RunState> {
    let config = PipelineConfig::load(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    let source = OracleSource::connect(&config.source, &config.run_flag).await?;
    let destination = MssqlDestination::connect(&config.destination)?;
    let notifier = source.mailer(&config.notification.sender);
    let controller = PipelineController::new(
        &source,
        &destination,
        &source,
        &notifier,
        ControllerSettings::from(&config),
    );

    let Some(seconds) = cli.interval_seconds.filter(|s| *s > 0) else {
        return Ok(run_once(&controller).await);
    };

    // Runs never overlap: the next tick waits for the previous run to finish.
    let mut ticker = tokio::time::interval(Duration::from_secs(seconds));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = RunState::Start;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                last = run_once(&controller).await;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; last run ended in {}", last.as_str());
                return Ok(last);
            }
        }
    }
}

async fn run_once(controller: &PipelineController<'_>) -> RunState {
    let report = controller.run().await;
    match serde_json::to_string(&report) {
        Ok(json) => log::info!("Run report: {}", json),
        Err(e) => log::warn!("Could not serialize run report: {}", e),
    }
    report.state
}
