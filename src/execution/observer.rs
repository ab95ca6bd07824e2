use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{Phase, PhaseReport, PhaseStatus};

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted,
    PhaseStarted { phase: Phase },
    PhaseFinished { report: PhaseReport },
    RunFinished { success: bool, elapsed: Duration },
}

/// Observer hook for pipeline events.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`. Failed phases are logged at `warn`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted => info!("pipeline run started"),
            PipelineEvent::PhaseStarted { phase } => info!(%phase, "phase started"),
            PipelineEvent::PhaseFinished { report } => match report.status {
                PhaseStatus::Failed => warn!(
                    phase = %report.phase,
                    error = report.error.as_deref().unwrap_or(""),
                    elapsed = ?report.elapsed,
                    "phase failed"
                ),
                _ => info!(
                    phase = %report.phase,
                    status = ?report.status,
                    processed = report.processed,
                    skipped = report.skipped,
                    failed = report.failed,
                    elapsed = ?report.elapsed,
                    "phase finished"
                ),
            },
            PipelineEvent::RunFinished { success, elapsed } => {
                info!(success, ?elapsed, "pipeline run finished")
            }
        }
    }
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}
