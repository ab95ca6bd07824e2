//! Keyword-based inference of a raw file's table kind.
//!
//! The evidence string is the parent directory name and the file name joined by a space and
//! upper-cased, so both `Empresas0/K3241.K03200Y0.D50111.EMPRECSV` and a loose
//! `EMPRESAS.csv` resolve to [`SourceTableKind::EntityMaster`]. Rules are tried in order and the
//! first keyword contained in the evidence wins.

use std::path::Path;

use super::SourceTableKind;

/// A substring and the kind it identifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub kind: SourceTableKind,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, kind: SourceTableKind) -> Self {
        Self {
            keyword: keyword.into().to_uppercase(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableClassifier {
    rules: Vec<KeywordRule>,
}

impl Default for TableClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl TableClassifier {
    /// Rules for the registry export's directory and file naming.
    pub fn standard() -> Self {
        use SourceTableKind::*;
        // EMPRE comes last: EMPRESA is the specific spelling and must win first.
        let rules = [
            ("EMPRESA", EntityMaster),
            ("ESTABELE", Establishment),
            ("SOCIO", Owner),
            ("CNAE", ClassificationCode),
            ("MOTIV", ReasonCode),
            ("MOTICSV", ReasonCode),
            ("MUNIC", Municipality),
            ("NATJU", LegalNature),
            ("NATUREZA", LegalNature),
            ("PAIS", Country),
            ("QUALI", QualificationCode),
            ("QUALS", QualificationCode),
            ("SIMPLES", SimplifiedTaxRegime),
            ("EMPRE", EntityMaster),
        ]
        .into_iter()
        .map(|(keyword, kind)| KeywordRule::new(keyword, kind))
        .collect();
        Self { rules }
    }

    /// A classifier with a caller-supplied rule order. Keywords are upper-cased.
    pub fn with_rules(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| KeywordRule::new(r.keyword, r.kind))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Classifies `path` from its parent directory name and file name.
    pub fn classify(&self, path: &Path) -> Option<SourceTableKind> {
        let parent = path
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        self.classify_evidence(&format!("{parent} {file}"))
    }

    /// Classifies a free-form evidence string (case-insensitive).
    pub fn classify_evidence(&self, evidence: &str) -> Option<SourceTableKind> {
        let evidence = evidence.to_uppercase();
        self.rules
            .iter()
            .find(|rule| evidence.contains(&rule.keyword))
            .map(|rule| rule.kind)
    }
}
