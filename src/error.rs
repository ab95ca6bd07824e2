use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// How far an error is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Handled where it occurs: the offending input is skipped and counted.
    Recoverable,
    /// Aborts the current phase (and, for fail-fast phases, the pipeline).
    Fatal,
}

/// Error type shared by every pipeline component.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A directory or artifact the phase depends on does not exist.
    #[error("not found: {what} ({})", .path.display())]
    NotFound { what: String, path: PathBuf },

    /// A single source file could not be read; the file is skipped.
    #[error("unreadable source file {}: {message}", .path.display())]
    PartialInput { path: PathBuf, message: String },

    /// I/O failure on a path the pipeline owns (the unified artifact, period directories).
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The unified artifact could not be decoded for aggregation.
    #[error("failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// A fetch or extract collaborator reported a failure.
    #[error("{phase} collaborator failed: {message}")]
    Collaborator { phase: String, message: String },

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// CSV error outside the per-file recovery path.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error for configuration or reports.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob pattern built from configuration.
    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl PipelineError {
    /// Wraps an [`std::io::Error`] together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classifies the error for the consolidation recovery policy.
    ///
    /// Only per-file input problems are recoverable. CSV errors count as recoverable unless they
    /// carry an I/O failure somewhere in their source chain.
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::PartialInput { .. } => Severity::Recoverable,
            PipelineError::Csv(err) => match err.kind() {
                csv::ErrorKind::Io(_) => Severity::Fatal,
                _ if error_chain_contains_io(err) => Severity::Fatal,
                _ => Severity::Recoverable,
            },
            _ => Severity::Fatal,
        }
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}
