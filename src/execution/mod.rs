//! Phase orchestration for a full pipeline run.
//!
//! [`PipelineOrchestrator::run`] drives Download → Extract → Consolidate → Cleanup in order:
//!
//! - the period is resolved once, by Download from the fetcher's listing, and every later phase
//!   works on it
//! - Download, Extract and Consolidate are fail-fast: an error halts the run, later phases are
//!   not attempted, and the returned report has `success == false`
//! - a Cleanup error is logged and recorded, and the run still succeeds
//! - every phase is reported to an optional [`PipelineObserver`] and collected into a
//!   [`PipelineReport`], which is written as JSON next to the unified artifact when configured

mod observer;
pub mod phases;

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::ConsolidationEngine;
use crate::locator::locate_latest_period;
use crate::state::{FsStateDetector, PhaseStateDetector};
use crate::types::DatasetPeriod;

pub use observer::{CompositeObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use phases::{Extractor, Fetcher, LocalArchives, PhaseContext, PhaseOutcome, RemoteListing};

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Download,
    Extract,
    Consolidate,
    Cleanup,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Download,
        Phase::Extract,
        Phase::Consolidate,
        Phase::Cleanup,
    ];

    /// Whether a failure of this phase halts the run.
    pub fn is_fail_fast(self) -> bool {
        !matches!(self, Phase::Cleanup)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Download => "download",
            Phase::Extract => "extract",
            Phase::Consolidate => "consolidate",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    /// The phase did its work.
    Completed,
    /// The detector found the phase's output already in place.
    Skipped,
    Failed,
}

/// Timing and counts of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_written: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub period: Option<DatasetPeriod>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseReport>,
    pub success: bool,
}

impl PipelineReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    /// The phase that halted a failed run.
    pub fn halted_at(&self) -> Option<&PhaseReport> {
        if self.success {
            return None;
        }
        self.phases.last().filter(|r| r.status == PhaseStatus::Failed)
    }

    /// Reads a report previously written by [`PipelineOrchestrator::run`].
    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        Ok(serde_json::from_reader(file)?)
    }

    fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Drives the phases of a run against one configuration.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    detector: Arc<dyn PhaseStateDetector>,
    engine: ConsolidationEngine,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("root", &self.config.root)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl PipelineOrchestrator {
    /// Validates `config` and wires the filesystem detector and the standard consolidation
    /// engine.
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            detector: Arc::new(FsStateDetector::from_config(&config)),
            engine: ConsolidationEngine::standard(&config),
            config,
            fetcher,
            extractor,
            observer: None,
        })
    }

    pub fn with_detector(mut self, detector: Arc<dyn PhaseStateDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_engine(mut self, engine: ConsolidationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn context(&self) -> PhaseContext<'_> {
        PhaseContext {
            config: &self.config,
            detector: self.detector.as_ref(),
        }
    }

    /// Runs every phase in order and returns the report of the run.
    ///
    /// A fail-fast failure halts the run: the report has `success == false` and ends with the
    /// failed phase, whose `error` holds the message. A Cleanup failure is recorded without
    /// failing the run. The report is written as JSON whenever the period was resolved.
    pub fn run(&self) -> PipelineReport {
        let started = Instant::now();
        let mut report = PipelineReport {
            period: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            phases: Vec::with_capacity(Phase::ALL.len()),
            success: false,
        };
        self.emit(PipelineEvent::RunStarted);

        let mut halted = false;
        for phase in Phase::ALL {
            self.emit(PipelineEvent::PhaseStarted { phase });
            let phase_started = Instant::now();
            let started_at = Utc::now();
            let result = self.execute(phase, &mut report.period);
            let mut phase_report = PhaseReport {
                phase,
                status: PhaseStatus::Failed,
                started_at,
                finished_at: Utc::now(),
                elapsed: phase_started.elapsed(),
                processed: 0,
                skipped: 0,
                failed: 0,
                rows_written: None,
                error: None,
            };

            match result {
                Ok(outcome) => {
                    phase_report.status = outcome.status;
                    phase_report.processed = outcome.processed;
                    phase_report.skipped = outcome.skipped;
                    phase_report.failed = outcome.failed;
                    phase_report.rows_written = outcome.rows_written;
                }
                Err(err) => {
                    phase_report.error = Some(err.to_string());
                    if phase.is_fail_fast() {
                        error!(%phase, error = %err, "phase failed; halting pipeline");
                        halted = true;
                    } else {
                        warn!(%phase, error = %err, "phase failed; continuing");
                    }
                }
            }

            self.emit(PipelineEvent::PhaseFinished {
                report: phase_report.clone(),
            });
            report.phases.push(phase_report);
            if halted {
                break;
            }
        }

        report.success = !halted;
        report.finished_at = Utc::now();
        self.emit(PipelineEvent::RunFinished {
            success: report.success,
            elapsed: started.elapsed(),
        });
        self.persist(&report);
        if report.success {
            info!(period = ?report.period, "pipeline finished");
        }
        report
    }

    /// Runs a single phase against the run's `period`.
    ///
    /// Download records the period of the fetcher's listing, before fetching. Extract resolves
    /// the latest period on disk only when none is recorded yet. Consolidate and Cleanup require
    /// it.
    pub fn execute(
        &self,
        phase: Phase,
        period: &mut Option<DatasetPeriod>,
    ) -> PipelineResult<PhaseOutcome> {
        let ctx = self.context();
        match phase {
            Phase::Download => {
                let listing = self.fetcher.list()?;
                *period = Some(listing.period.clone());
                phases::download(ctx, self.fetcher.as_ref(), &listing)
            }
            Phase::Extract => {
                if period.is_none() {
                    *period = Some(locate_latest_period(&self.config.root)?);
                }
                let p = self.require_period(period.as_ref())?;
                phases::extract(ctx, self.extractor.as_ref(), p)
            }
            Phase::Consolidate => {
                let p = self.require_period(period.as_ref())?;
                phases::consolidate(ctx, &self.engine, p)
            }
            Phase::Cleanup => {
                let p = self.require_period(period.as_ref())?;
                phases::cleanup(ctx, p)
            }
        }
    }

    fn require_period<'a>(
        &self,
        period: Option<&'a DatasetPeriod>,
    ) -> PipelineResult<&'a DatasetPeriod> {
        period.ok_or_else(|| {
            PipelineError::not_found("YYYY-MM period directory", &self.config.root)
        })
    }

    /// Path the run report is written to, if reporting is enabled.
    pub fn report_path(&self, period: &DatasetPeriod) -> Option<PathBuf> {
        self.config
            .report_name
            .as_ref()
            .map(|name| self.config.period_dir(period).join(name))
    }

    fn persist(&self, report: &PipelineReport) {
        let Some(path) = report.period.as_ref().and_then(|p| self.report_path(p)) else {
            return;
        };
        if let Err(err) = report.write_json(&path) {
            warn!(path = %path.display(), error = %err, "could not write run report");
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(o) = &self.observer {
            o.on_event(&event);
        }
    }
}
