//! Source table kinds, their positional field mappings, and file classification.
//!
//! - [`registry`]: the fixed kind → mapping table and the derived [`CanonicalHeader`]
//! - [`classifier`]: keyword rules that infer a file's [`SourceTableKind`] from its path

pub mod classifier;
pub mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use classifier::{KeywordRule, TableClassifier};
pub use registry::{CanonicalHeader, FieldMapping, PROVENANCE_FIELD, SchemaRegistry};

/// The table categories published in the registry export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTableKind {
    /// Company master records (`EMPRE`).
    EntityMaster,
    /// Establishments: head office and branches (`ESTABELE`).
    Establishment,
    /// Partners and owners (`SOCIO`).
    Owner,
    /// Economic activity codes (`CNAES`).
    ClassificationCode,
    /// Registration status reasons (`MOTIVOS`).
    ReasonCode,
    Municipality,
    LegalNature,
    Country,
    /// Partner qualification codes (`QUALS`).
    QualificationCode,
    /// Simplified tax regime options (`SIMPLES`).
    SimplifiedTaxRegime,
}

impl SourceTableKind {
    pub const ALL: [SourceTableKind; 10] = [
        SourceTableKind::ClassificationCode,
        SourceTableKind::ReasonCode,
        SourceTableKind::Municipality,
        SourceTableKind::LegalNature,
        SourceTableKind::Country,
        SourceTableKind::QualificationCode,
        SourceTableKind::EntityMaster,
        SourceTableKind::Establishment,
        SourceTableKind::Owner,
        SourceTableKind::SimplifiedTaxRegime,
    ];

    /// Code written to the provenance column.
    pub fn code(self) -> &'static str {
        match self {
            SourceTableKind::EntityMaster => "EMPRE",
            SourceTableKind::Establishment => "ESTABELE",
            SourceTableKind::Owner => "SOCIO",
            SourceTableKind::ClassificationCode => "CNAES",
            SourceTableKind::ReasonCode => "MOTIVOS",
            SourceTableKind::Municipality => "MUNIC",
            SourceTableKind::LegalNature => "NATJU",
            SourceTableKind::Country => "PAIS",
            SourceTableKind::QualificationCode => "QUALS",
            SourceTableKind::SimplifiedTaxRegime => "SIMPLES",
        }
    }
}

impl FromStr for SourceTableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceTableKind::ALL
            .into_iter()
            .find(|k| k.code() == s)
            .ok_or_else(|| format!("unknown table kind '{s}'"))
    }
}

impl fmt::Display for SourceTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
