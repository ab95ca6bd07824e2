//! Resolution of the current dataset period from the root directory listing.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::types::DatasetPeriod;

/// Returns the most recent `YYYY-MM` subdirectory of `root`.
///
/// Only directories qualify; files with a period-like name are ignored. Fails with
/// [`PipelineError::NotFound`] when the root cannot be listed or nothing qualifies.
pub fn locate_latest_period(root: impl AsRef<Path>) -> PipelineResult<DatasetPeriod> {
    let root = root.as_ref();
    let entries = fs::read_dir(root).map_err(|_| PipelineError::not_found("dataset root", root))?;

    let mut latest: Option<DatasetPeriod> = None;
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if let Ok(period) = name.parse::<DatasetPeriod>() {
            if latest.as_ref().is_none_or(|cur| period > *cur) {
                latest = Some(period);
            }
        }
    }

    match latest {
        Some(period) => {
            debug!(root = %root.display(), %period, "resolved dataset period");
            Ok(period)
        }
        None => Err(PipelineError::not_found("YYYY-MM period directory", root)),
    }
}
