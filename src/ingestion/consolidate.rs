//! Streaming consolidation of heterogeneous source tables.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{SchemaRegistry, SourceTableKind, TableClassifier};

use super::decode_legacy;
use super::sniff::DelimiterSniffer;
use super::summary::{ConsolidationSummary, FileStatus, SourceFileReport};

/// Date stamp the export appends to some file names (`F.K03200$W.SIMPLES.CSV.D50111`).
static DATE_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.D\d{5}$").expect("date stamp pattern is a valid regex"));

/// Maps every raw table file under a working directory onto the canonical header and writes one
/// unified CSV artifact.
///
/// The registry and classifier are shared immutable tables; the engine itself holds no state
/// between runs.
#[derive(Debug, Clone)]
pub struct ConsolidationEngine {
    registry: Arc<SchemaRegistry>,
    classifier: Arc<TableClassifier>,
    sniffer: DelimiterSniffer,
    source_suffixes: Vec<String>,
    output_delimiter: u8,
}

impl ConsolidationEngine {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        classifier: Arc<TableClassifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            sniffer: DelimiterSniffer::from_config(config),
            source_suffixes: config
                .source_suffixes
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            output_delimiter: config.output_delimiter_byte(),
        }
    }

    /// Engine over the standard registry and classifier.
    pub fn standard(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(SchemaRegistry::standard()),
            Arc::new(TableClassifier::standard()),
            config,
        )
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Whether a file name looks like a raw table file.
    pub fn is_source_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.source_suffixes.iter().any(|s| lower.ends_with(s.as_str()))
            || DATE_STAMP.is_match(file_name)
    }

    /// Raw table files under `working_dir`, in file-name order at every level.
    ///
    /// Symlinks are not followed but are still listed, so a dangling one is reported as a failed
    /// source file instead of vanishing from the summary.
    pub fn discover(&self, working_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(working_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() && !entry.path_is_symlink() {
                continue;
            }
            if self.is_source_file(&entry.file_name().to_string_lossy()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Consolidates every source file under `working_dir` into `artifact`, replacing it.
    ///
    /// Unreadable source files are recorded in the summary and skipped. A failure writing the
    /// artifact aborts the run with [`PipelineError::Io`].
    #[instrument(
        level = "info",
        skip(self, working_dir, artifact),
        fields(working_dir = %working_dir.display())
    )]
    pub fn consolidate(
        &self,
        working_dir: &Path,
        artifact: &Path,
    ) -> PipelineResult<ConsolidationSummary> {
        if !working_dir.is_dir() {
            return Err(PipelineError::not_found("extraction working directory", working_dir));
        }
        let sources = self.discover(working_dir)?;
        if sources.is_empty() {
            warn!("no source files found; writing a header-only artifact");
        }

        let header = self.registry.header();
        let out = File::create(artifact).map_err(|e| PipelineError::io(artifact, e))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.output_delimiter)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        writer
            .write_record(header.names())
            .map_err(|e| output_error(artifact, e))?;

        let mut summary = ConsolidationSummary {
            artifact: artifact.to_path_buf(),
            header_len: header.len(),
            ..Default::default()
        };
        let mut row = vec![String::new(); header.len()];

        for path in sources {
            let Some(kind) = self.classifier.classify(&path) else {
                debug!(path = %path.display(), "unclassified source file skipped");
                summary.files.push(SourceFileReport {
                    path,
                    kind: None,
                    delimiter: None,
                    status: FileStatus::Unclassified,
                });
                continue;
            };

            let delimiter = self.sniffer.sniff_path(&path);
            let status = self.append_file(
                &path,
                kind,
                delimiter,
                &mut writer,
                &mut row,
                artifact,
                &mut summary.rows_written,
            )?;
            match &status {
                FileStatus::Consolidated { rows, short_records } => info!(
                    path = %path.display(),
                    %kind,
                    delimiter = %char::from(delimiter),
                    rows,
                    short_records,
                    "consolidated source file"
                ),
                FileStatus::Failed { error } => {
                    warn!(path = %path.display(), %kind, error = %error, "source file failed")
                }
                FileStatus::Unclassified => {}
            }
            summary.files.push(SourceFileReport {
                path,
                kind: Some(kind),
                delimiter: Some(delimiter),
                status,
            });
        }

        writer.flush().map_err(|e| PipelineError::io(artifact, e))?;
        info!(
            artifact = %artifact.display(),
            rows = summary.rows_written,
            processed = summary.processed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "consolidation finished"
        );
        Ok(summary)
    }

    /// Streams one source file into `writer`. Read failures come back as
    /// [`FileStatus::Failed`]; write failures are returned as errors.
    #[allow(clippy::too_many_arguments)]
    fn append_file<W: std::io::Write>(
        &self,
        path: &Path,
        kind: SourceTableKind,
        delimiter: u8,
        writer: &mut csv::Writer<W>,
        row: &mut [String],
        artifact: &Path,
        rows_written: &mut u64,
    ) -> PipelineResult<FileStatus> {
        let projection = self.registry.projection(kind);
        let provenance = self.registry.header().provenance_index();

        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(b'"')
            .from_path(path)
        {
            Ok(r) => r,
            Err(e) => return Ok(partial_input(path, e)),
        };

        let mut record = csv::ByteRecord::new();
        let mut rows = 0u64;
        let mut short_records = 0u64;
        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Ok(partial_input(path, e)),
            }

            for cell in row.iter_mut() {
                cell.clear();
            }
            let mut short = false;
            for &(src, pos) in projection {
                match record.get(src) {
                    Some(raw) => row[pos].push_str(decode_legacy(raw).trim()),
                    None => short = true,
                }
            }
            if short {
                short_records += 1;
            }
            row[provenance].push_str(kind.code());

            writer
                .write_record(row.iter())
                .map_err(|e| output_error(artifact, e))?;
            rows += 1;
            *rows_written += 1;
        }

        Ok(FileStatus::Consolidated {
            rows,
            short_records,
        })
    }
}

fn partial_input(path: &Path, err: csv::Error) -> FileStatus {
    FileStatus::Failed {
        error: PipelineError::PartialInput {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

fn output_error(artifact: &Path, err: csv::Error) -> PipelineError {
    PipelineError::io(artifact, std::io::Error::from(err))
}
