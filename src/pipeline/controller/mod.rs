// =====================================================
// RUN GATE & PIPELINE CONTROLLER
// =====================================================

use crate::config::{PipelineConfig, RunFlagSettings, ScheduleCopySettings};
use crate::error::{PipelineError, Result};
use crate::pipeline::driver::{run_extraction, ExtractionSettings, TableLoadSummary};
use crate::pipeline::notify::{FailureReporter, NotificationSettings, Notifier};
use crate::pipeline::systems::{DestinationSystem, RunFlagStore, SourceSystem};
use crate::pipeline::writer::replace_load_into_source;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const FLAG_ENABLED: &str = "S";
pub const FLAG_DISABLED: &str = "N";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Start,
    Gate,
    Extracting,
    Copying,
    ResettingFlag,
    Done,
    SkippedNoOp,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Gate => "gate",
            Self::Extracting => "extracting",
            Self::Copying => "copying",
            Self::ResettingFlag => "resetting_flag",
            Self::Done => "done",
            Self::SkippedNoOp => "skipped_no_op",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::SkippedNoOp | Self::Failed)
    }

    /// Terminal states the scheduler sees as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done | Self::SkippedNoOp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Begin,
    FlagRead(bool),
    StepSucceeded,
    StepFailed,
}

/// Controller state machine. Events that do not apply to a state leave it unchanged.
pub fn transition(state: RunState, event: RunEvent) -> RunState {
    use RunState::*;

    match (state, event) {
        (Start, RunEvent::Begin) => Gate,
        (Gate, RunEvent::FlagRead(true)) => Extracting,
        (Gate, RunEvent::FlagRead(false)) => SkippedNoOp,
        (Extracting, RunEvent::StepSucceeded) => Copying,
        (Copying, RunEvent::StepSucceeded) => ResettingFlag,
        (ResettingFlag, RunEvent::StepSucceeded) => Done,
        (Extracting | Copying | ResettingFlag, RunEvent::StepFailed) => Failed,
        (unchanged, _) => unchanged,
    }
}

/// Only an exact `S` enables a run; `N`, anything else or no row skips it.
pub fn is_run_enabled(value: Option<&str>) -> bool {
    value.map(str::trim) == Some(FLAG_ENABLED)
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub extraction: ExtractionSettings,
    pub run_flag: RunFlagSettings,
    pub schedule_copy: ScheduleCopySettings,
    pub notification: NotificationSettings,
    pub batch_size: usize,
}

impl From<&PipelineConfig> for ControllerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            extraction: ExtractionSettings::from(config),
            run_flag: config.run_flag.clone(),
            schedule_copy: config.schedule_copy.clone(),
            notification: config.notification.clone(),
            batch_size: config.batch_size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables: Vec<TableLoadSummary>,
    pub copied_rows: Option<usize>,
    pub error: Option<String>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            state: RunState::Start,
            started_at: Utc::now(),
            finished_at: None,
            tables: Vec::new(),
            copied_rows: None,
            error: None,
        }
    }
}

pub struct PipelineController<'a> {
    source: &'a dyn SourceSystem,
    destination: &'a dyn DestinationSystem,
    flags: &'a dyn RunFlagStore,
    notifier: &'a dyn Notifier,
    settings: ControllerSettings,
}

impl<'a> PipelineController<'a> {
    pub fn new(
        source: &'a dyn SourceSystem,
        destination: &'a dyn DestinationSystem,
        flags: &'a dyn RunFlagStore,
        notifier: &'a dyn Notifier,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            source,
            destination,
            flags,
            notifier,
            settings,
        }
    }

    fn reporter(&self) -> FailureReporter<'_> {
        FailureReporter::new(self.notifier, &self.settings.notification)
    }

    /// Reads the run flag once. A read failure is reported and counts as disabled.
    pub async fn read_run_flag(&self) -> bool {
        let key = &self.settings.run_flag.key;
        match self.flags.read_flag(key).await {
            Ok(value) => {
                log::info!("Run flag {} = {:?}", key, value);
                is_run_enabled(value.as_deref())
            }
            Err(e) => {
                self.reporter().report("checking the run flag", &e).await;
                false
            }
        }
    }

    pub async fn run(&self) -> RunReport {
        let run_enabled = self.read_run_flag().await;
        self.run_with_flag(run_enabled).await
    }

    /// Drives one run from Start to a terminal state, `run_enabled` being the flag read at start.
    pub async fn run_with_flag(&self, run_enabled: bool) -> RunReport {
        let mut report = RunReport::new();
        let mut state = transition(RunState::Start, RunEvent::Begin);
        state = transition(state, RunEvent::FlagRead(run_enabled));
        log::info!("Run {} gate decision: {}", report.run_id, state.as_str());

        while !state.is_terminal() {
            log::info!("Run {} entering {}", report.run_id, state.as_str());
            let outcome = match state {
                RunState::Extracting => self.extract(&mut report).await,
                RunState::Copying => self.copy_schedule(&mut report).await,
                RunState::ResettingFlag => self.reset_run_flag().await,
                _ => Ok(()),
            };
            let event = match outcome {
                Ok(()) => RunEvent::StepSucceeded,
                Err(e) => {
                    report.error = Some(e.to_string());
                    RunEvent::StepFailed
                }
            };
            state = transition(state, event);
        }

        report.state = state;
        report.finished_at = Some(Utc::now());
        match state {
            RunState::Failed => log::error!(
                "Run {} failed; run flag left at {} for the next attempt",
                report.run_id,
                FLAG_ENABLED
            ),
            _ => log::info!("Run {} finished: {}", report.run_id, state.as_str()),
        }
        report
    }

    async fn extract(&self, report: &mut RunReport) -> Result<()> {
        let summaries = run_extraction(
            self.source,
            self.destination,
            &self.reporter(),
            &self.settings.extraction,
        )
        .await?;
        report.tables = summaries;
        Ok(())
    }

    /// Replaces the source schedule table with the destination's contents.
    /// An empty destination table leaves the source untouched.
    async fn copy_schedule(&self, report: &mut RunReport) -> Result<()> {
        let copy = &self.settings.schedule_copy;
        let result: Result<usize> = async {
            let rows = self
                .destination
                .fetch_table(&format!("SELECT * FROM {}", copy.from_table))
                .await?;
            if rows.is_empty() {
                log::info!("{} is empty, nothing to copy", copy.from_table);
                return Ok(0);
            }
            replace_load_into_source(self.source, &copy.to_table, &rows, self.settings.batch_size)
                .await
        }
        .await;

        match result {
            Ok(copied) => {
                report.copied_rows = Some(copied);
                Ok(())
            }
            Err(e) => {
                self.reporter().report("copying the schedule", &e).await;
                Err(e)
            }
        }
    }

    async fn reset_run_flag(&self) -> Result<()> {
        let key = &self.settings.run_flag.key;
        let result: Result<()> = async {
            self.flags.write_flag(key, FLAG_DISABLED).await?;
            let value = self.flags.read_flag(key).await?;
            if value.as_deref().map(str::trim) != Some(FLAG_DISABLED) {
                return Err(PipelineError::RunFlag(format!(
                    "Failed to verify update of {} (read back {:?})",
                    key, value
                )));
            }
            log::info!("Run flag {} reset to {}", key, FLAG_DISABLED);
            Ok(())
        }
        .await;

        if let Err(e) = &result {
            self.reporter()
                .report(&format!("updating the {} parameter", key), e)
                .await;
        }
        result
    }
}
