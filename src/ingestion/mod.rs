//! Consolidation of raw registry tables into the unified artifact.
//!
//! Most callers should use [`ConsolidationEngine::consolidate`], which:
//!
//! - walks the extraction working directory in file-name order
//! - classifies each source file and sniffs its delimiter ([`sniff`])
//! - maps every record onto the canonical header and streams it to one CSV artifact
//! - returns a [`ConsolidationSummary`] with one report per discovered file

pub mod consolidate;
pub mod sniff;
pub mod summary;

use std::borrow::Cow;

pub use consolidate::ConsolidationEngine;
pub use sniff::DelimiterSniffer;
pub use summary::{ConsolidationSummary, FileStatus, SourceFileReport};

/// Decodes bytes in the export's legacy single-byte encoding (ISO-8859-1, read as its
/// windows-1252 superset). Every byte maps to a character, so decoding never fails.
pub fn decode_legacy(bytes: &[u8]) -> Cow<'_, str> {
    encoding_rs::WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
}
