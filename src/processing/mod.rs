//! Typed decoding and per-entity aggregation of the unified artifact.
//!
//! - [`load`]: streaming typed reader over a delimited file ([`TypedCsvReader`])
//! - [`aggregate`]: group-by-key with first-wins and collect-distinct columns
//! - [`filter()`]: row filtering on the typed [`crate::types::DataSet`]
//!
//! ## Example
//!
//! ```no_run
//! use cnpj_etl::config::PipelineConfig;
//! use cnpj_etl::processing::AggregationEngine;
//!
//! let config = PipelineConfig::default();
//! let engine = AggregationEngine::from_config(&config);
//! let period = "2025-11".parse().unwrap();
//! let out = engine.aggregate(&config.unified_artifact_path(&period))?;
//! engine.write_csv(&out.dataset, &config.aggregated_artifact_path(&period))?;
//! # Ok::<(), cnpj_etl::error::PipelineError>(())
//! ```

pub mod aggregate;
pub mod filter;
pub mod load;

pub use aggregate::{Aggregated, AggregationEngine, AggregationSummary};
pub use filter::{filter, filter_eq};
pub use load::{load_dataset, LoadStats, TypedCsvReader};
