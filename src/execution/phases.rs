//! The four pipeline phases and the collaborators they delegate to.
//!
//! Every phase consults the [`PhaseStateDetector`] before doing any work, so re-running a
//! finished pipeline touches nothing.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::ConsolidationEngine;
use crate::locator::locate_latest_period;
use crate::state::{
    archive_stem, dir_is_non_empty, file_larger_than, PhaseEvidence, PhaseStateDetector,
};
use crate::types::DatasetPeriod;

use super::PhaseStatus;

/// The archives published for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListing {
    pub period: DatasetPeriod,
    /// Archive file names, e.g. `Empresas0.zip`.
    pub archives: Vec<String>,
}

/// Source of archives. Transport, retries and resumption are the implementor's concern.
pub trait Fetcher: Send + Sync {
    /// Lists the latest release.
    fn list(&self) -> PipelineResult<RemoteListing>;

    /// Downloads `archive` into `dest_dir`, replacing any partial file.
    fn fetch(&self, archive: &str, dest_dir: &Path) -> PipelineResult<()>;
}

/// Unpacks one archive into `dest_dir`, which already exists and is empty.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()>;
}

/// A [`Fetcher`] that treats the archives already present in the latest period directory as the
/// release listing. It never downloads.
#[derive(Debug, Clone)]
pub struct LocalArchives {
    root: PathBuf,
    extension: String,
}

impl LocalArchives {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.root, &config.archive_extension)
    }
}

impl Fetcher for LocalArchives {
    fn list(&self) -> PipelineResult<RemoteListing> {
        let period = locate_latest_period(&self.root)?;
        let archives = list_archives(&self.root.join(period.as_str()), &self.extension)?;
        Ok(RemoteListing { period, archives })
    }

    fn fetch(&self, archive: &str, _dest_dir: &Path) -> PipelineResult<()> {
        Err(PipelineError::Collaborator {
            phase: "download".to_string(),
            message: format!(
                "'{archive}' is missing or truncated and local archives cannot be fetched"
            ),
        })
    }
}

/// File names of the `*.{extension}` files directly inside `dir` (case-insensitive), sorted.
pub fn list_archives(dir: &Path, extension: &str) -> PipelineResult<Vec<String>> {
    glob_archives(dir, extension, true)
}

fn glob_archives(dir: &Path, extension: &str, files_only: bool) -> PipelineResult<Vec<String>> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(extension)
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut names = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PipelineError::io(path, std::io::Error::from(e))
        })?;
        if files_only && !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Work counts of a phase that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub status: PhaseStatus,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Rows written to the unified artifact (Consolidate only).
    pub rows_written: Option<u64>,
}

impl PhaseOutcome {
    fn skipped(count: usize) -> Self {
        Self {
            status: PhaseStatus::Skipped,
            processed: 0,
            skipped: count,
            failed: 0,
            rows_written: None,
        }
    }

    fn completed(processed: usize, skipped: usize, failed: usize) -> Self {
        Self {
            status: PhaseStatus::Completed,
            processed,
            skipped,
            failed,
            rows_written: None,
        }
    }
}

/// Shared inputs of every phase.
#[derive(Clone, Copy)]
pub struct PhaseContext<'a> {
    pub config: &'a PipelineConfig,
    pub detector: &'a dyn PhaseStateDetector,
}

/// Fetches the archives of `listing` that are missing or truncated locally.
///
/// Succeeds iff every listed archive passes the download check afterwards.
#[instrument(level = "info", skip_all, fields(period = %listing.period))]
pub fn download(
    ctx: PhaseContext<'_>,
    fetcher: &dyn Fetcher,
    listing: &RemoteListing,
) -> PipelineResult<PhaseOutcome> {
    let dir = ctx.config.period_dir(&listing.period);
    fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

    let evidence = PhaseEvidence::Download {
        dir: &dir,
        archives: &listing.archives,
    };
    if ctx.detector.assess(&evidence).is_complete() {
        info!(archives = listing.archives.len(), "archives already present");
        return Ok(PhaseOutcome::skipped(listing.archives.len()));
    }

    let (mut fetched, mut present, mut failed) = (0, 0, 0);
    for archive in &listing.archives {
        if file_larger_than(&dir.join(archive), ctx.config.min_archive_bytes) {
            present += 1;
            continue;
        }
        match fetcher.fetch(archive, &dir) {
            Ok(()) => fetched += 1,
            Err(err) => {
                warn!(archive = %archive, error = %err, "fetch failed");
                failed += 1;
            }
        }
    }

    if !ctx.detector.assess(&evidence).is_complete() {
        return Err(PipelineError::Collaborator {
            phase: "download".to_string(),
            message: format!(
                "archives still missing or truncated after fetching ({failed} of {} fetches failed)",
                listing.archives.len() - present
            ),
        });
    }
    Ok(PhaseOutcome::completed(fetched, present, failed))
}

/// Extracts every archive of `period` that lacks a populated output directory.
///
/// Succeeds when the share of archives that end up extracted reaches
/// [`PipelineConfig::min_extract_success_ratio`].
#[instrument(level = "info", skip_all, fields(%period))]
pub fn extract(
    ctx: PhaseContext<'_>,
    extractor: &dyn Extractor,
    period: &DatasetPeriod,
) -> PipelineResult<PhaseOutcome> {
    let config = ctx.config;
    let period_dir = config.period_dir(period);
    let archives = list_archives(&period_dir, &config.archive_extension)?;
    if archives.is_empty() {
        info!("no archives to extract");
        return Ok(PhaseOutcome::completed(0, 0, 0));
    }

    let working_dir = config.working_dir(period);
    let evidence = PhaseEvidence::Extract {
        working_dir: &working_dir,
        archives: &archives,
    };
    if ctx.detector.assess(&evidence).is_complete() {
        info!(archives = archives.len(), "archives already extracted");
        return Ok(PhaseOutcome::skipped(archives.len()));
    }

    fs::create_dir_all(&working_dir).map_err(|e| PipelineError::io(&working_dir, e))?;
    let (mut extracted, mut present, mut failed) = (0usize, 0usize, 0usize);
    for archive in &archives {
        let dest = working_dir.join(archive_stem(archive));
        if dir_is_non_empty(&dest) {
            present += 1;
            continue;
        }
        fs::create_dir_all(&dest).map_err(|e| PipelineError::io(&dest, e))?;
        match extractor.extract(&period_dir.join(archive), &dest) {
            Ok(()) => {
                debug!(archive = %archive, "extracted");
                extracted += 1;
            }
            Err(err) => {
                warn!(
                    archive = %archive,
                    error = %err,
                    "extraction failed; removing partial output"
                );
                if let Err(e) = fs::remove_dir_all(&dest) {
                    warn!(dir = %dest.display(), error = %e, "could not remove partial output");
                }
                failed += 1;
            }
        }
    }

    let ratio = (extracted + present) as f64 / archives.len() as f64;
    if ratio < config.min_extract_success_ratio {
        return Err(PipelineError::Collaborator {
            phase: "extract".to_string(),
            message: format!(
                "only {} of {} archives extracted (minimum ratio {})",
                extracted + present,
                archives.len(),
                config.min_extract_success_ratio
            ),
        });
    }
    Ok(PhaseOutcome::completed(extracted, present, failed))
}

/// Runs the consolidation engine unless the unified artifact already passes the size check.
#[instrument(level = "info", skip_all, fields(%period))]
pub fn consolidate(
    ctx: PhaseContext<'_>,
    engine: &ConsolidationEngine,
    period: &DatasetPeriod,
) -> PipelineResult<PhaseOutcome> {
    let working_dir = ctx.config.working_dir(period);
    if !working_dir.is_dir() {
        return Err(PipelineError::not_found("extraction working directory", working_dir));
    }
    let artifact = ctx.config.unified_artifact_path(period);
    if ctx
        .detector
        .assess(&PhaseEvidence::Consolidate { artifact: &artifact })
        .is_complete()
    {
        info!(artifact = %artifact.display(), "unified artifact already present");
        return Ok(PhaseOutcome::skipped(0));
    }

    let summary = engine.consolidate(&working_dir, &artifact)?;
    Ok(PhaseOutcome {
        rows_written: Some(summary.rows_written),
        ..PhaseOutcome::completed(summary.processed(), summary.skipped(), summary.failed())
    })
}

/// Deletes the archives of `period`. Every deletion is attempted; the first failure is returned.
#[instrument(level = "info", skip_all, fields(%period))]
pub fn cleanup(ctx: PhaseContext<'_>, period: &DatasetPeriod) -> PipelineResult<PhaseOutcome> {
    let period_dir = ctx.config.period_dir(period);
    // Any entry still carrying the archive extension counts, so one that cannot be removed as a
    // file is reported instead of silently left behind.
    let remaining = glob_archives(&period_dir, &ctx.config.archive_extension, false)?;
    if ctx
        .detector
        .assess(&PhaseEvidence::Cleanup { remaining: &remaining })
        .is_complete()
    {
        info!("no archives left to delete");
        return Ok(PhaseOutcome::skipped(0));
    }

    let mut deleted = 0;
    let mut first_error = None;
    let mut failed = 0;
    for name in &remaining {
        let path = period_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not delete archive");
                failed += 1;
                first_error.get_or_insert(PipelineError::io(path, e));
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(PhaseOutcome::completed(deleted, 0, failed)),
    }
}
