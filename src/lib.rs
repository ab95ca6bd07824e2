//! `cnpj-etl` turns the periodic bulk export of the Brazilian company registry (CNPJ) into one
//! unified table and a per-company aggregated view.
//!
//! The export ships as many archives of headerless, `;`-separated, ISO-8859-1 text tables
//! (companies, establishments, partners, code tables, ...), each with its own positional layout.
//! This crate:
//!
//! - resolves the newest `YYYY-MM` release directory ([`locator`])
//! - decides from filesystem evidence alone whether each phase already ran ([`state`])
//! - maps every table kind onto one canonical header ([`schema`]) and streams all records into
//!   a single UTF-8 artifact ([`ingestion`])
//! - groups that artifact by company key into a deduplicated view ([`processing`])
//! - orchestrates Download → Extract → Consolidate → Cleanup with a fail-fast policy
//!   ([`execution`])
//!
//! Network transfer and archive decompression are collaborators behind the
//! [`execution::Fetcher`] and [`execution::Extractor`] traits.
//!
//! ## Quick example: run the pipeline over archives already on disk
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use cnpj_etl::config::PipelineConfig;
//! use cnpj_etl::execution::{Extractor, LocalArchives, PipelineOrchestrator, TracingObserver};
//! use cnpj_etl::PipelineResult;
//!
//! struct Unzip;
//!
//! impl Extractor for Unzip {
//!     fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()> {
//!         // Decompress `archive` into `dest_dir` with the archive library of your choice.
//!         # let _ = (archive, dest_dir);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> PipelineResult<()> {
//! cnpj_etl::telemetry::init_tracing("info");
//! let config = PipelineConfig::default();
//! let orchestrator = PipelineOrchestrator::new(
//!     config.clone(),
//!     Arc::new(LocalArchives::from_config(&config)),
//!     Arc::new(Unzip),
//! )?
//! .with_observer(Arc::new(TracingObserver));
//!
//! let report = orchestrator.run();
//! println!("success={} phases={}", report.success, report.phases.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Aggregating the unified artifact
//!
//! ```no_run
//! use cnpj_etl::config::PipelineConfig;
//! use cnpj_etl::locator::locate_latest_period;
//! use cnpj_etl::processing::AggregationEngine;
//!
//! # fn main() -> cnpj_etl::PipelineResult<()> {
//! let config = PipelineConfig::default();
//! let period = locate_latest_period(&config.root)?;
//! let engine = AggregationEngine::from_config(&config);
//! let out = engine.aggregate(&config.unified_artifact_path(&period))?;
//! engine.write_csv(&out.dataset, &config.aggregated_artifact_path(&period))?;
//! println!("active companies={}", out.dataset.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: [`config::PipelineConfig`] with defaults matching the export layout
//! - [`error`]: the crate-wide [`PipelineError`]
//! - [`types`]: release identifier and the typed in-memory dataset model
//! - [`telemetry`]: `tracing` subscriber setup

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod locator;
pub mod processing;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod types;

pub use error::{PipelineError, PipelineResult, Severity};
