//! Per-file outcomes of a consolidation pass.
//!
//! Input problems are values here, not early returns: a file that cannot be read is recorded as
//! [`FileStatus::Failed`] and the pass moves on to the next file.

use std::path::PathBuf;

use crate::error::{PipelineError, Severity};
use crate::schema::SourceTableKind;

/// What happened to one discovered source file.
#[derive(Debug)]
pub enum FileStatus {
    /// Every record was appended. `short_records` counts records that lacked a mapped column.
    Consolidated { rows: u64, short_records: u64 },
    /// No keyword rule matched; the file contributed nothing.
    Unclassified,
    /// Reading stopped on an error. Rows appended before the error stay in the artifact.
    Failed { error: PipelineError },
}

#[derive(Debug)]
pub struct SourceFileReport {
    pub path: PathBuf,
    pub kind: Option<SourceTableKind>,
    /// Sniffed delimiter; `None` for unclassified files, which are never opened.
    pub delimiter: Option<u8>,
    pub status: FileStatus,
}

impl SourceFileReport {
    pub fn severity(&self) -> Option<Severity> {
        match &self.status {
            FileStatus::Failed { error } => Some(error.severity()),
            _ => None,
        }
    }
}

/// Result of [`super::ConsolidationEngine::consolidate`].
#[derive(Debug, Default)]
pub struct ConsolidationSummary {
    pub artifact: PathBuf,
    /// Width of every written row, provenance column included.
    pub header_len: usize,
    pub files: Vec<SourceFileReport>,
    /// Data rows written, excluding the header.
    pub rows_written: u64,
}

impl ConsolidationSummary {
    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Consolidated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Unclassified))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn short_records(&self) -> u64 {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Consolidated { short_records, .. } => short_records,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceFileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}
