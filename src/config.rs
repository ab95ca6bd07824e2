//! Pipeline configuration.
//!
//! [`PipelineConfig`] is built once at startup (from [`Default`] or a JSON file) and passed by
//! reference to every component. All fields have defaults matching the layout of the CNPJ open
//! data release, so a JSON file only needs to override what differs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::DatasetPeriod;

/// Top-level configuration for the phases and engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one `YYYY-MM` subdirectory per release.
    pub root: PathBuf,
    /// Name of the extraction working directory inside the period directory.
    pub working_dir_name: String,
    /// File name of the unified artifact written by consolidation.
    pub unified_artifact_name: String,
    /// File name of the per-entity aggregated artifact.
    pub aggregated_artifact_name: String,
    /// File name of the JSON run report; `None` disables writing it.
    pub report_name: Option<String>,
    /// Archive file extension, without the dot.
    pub archive_extension: String,
    /// An archive at or below this size counts as a truncated download.
    pub min_archive_bytes: u64,
    /// A unified artifact at or below this size counts as incomplete.
    pub min_artifact_bytes: u64,
    /// Number of bytes read when sniffing a source file's delimiter.
    pub sniff_sample_bytes: usize,
    /// Delimiter used when sniffing fails.
    pub default_delimiter: char,
    /// Candidates considered by the delimiter sniffer, in preference order.
    pub delimiter_candidates: Vec<char>,
    /// Delimiter of the unified and aggregated artifacts.
    pub output_delimiter: char,
    /// Lower-cased file name suffixes that mark raw table files.
    pub source_suffixes: Vec<String>,
    /// Minimum share of archives that must extract cleanly for the phase to succeed.
    pub min_extract_success_ratio: f64,
    pub aggregation: AggregationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Dados_CNPJ"),
            working_dir_name: "Temp_brutos".to_string(),
            unified_artifact_name: "CSV_Mestre_Final.csv".to_string(),
            aggregated_artifact_name: "Empresas_Ativas.csv".to_string(),
            report_name: Some("pipeline_report.json".to_string()),
            archive_extension: "zip".to_string(),
            min_archive_bytes: 1024,
            min_artifact_bytes: 1024 * 1024,
            sniff_sample_bytes: 1024,
            default_delimiter: ';',
            delimiter_candidates: vec![';', ',', '\t', '|'],
            output_delimiter: ';',
            source_suffixes: [
                ".csv", ".txt", "estabele", "emprecsv", "sociocsv", "natjucsv", "paiscsv",
                "moticsv", "municcsv", "cnaecsv", "qualscsv", ".simples",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_extract_success_ratio: 0.9,
            aggregation: AggregationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        ascii_byte("default_delimiter", self.default_delimiter)?;
        ascii_byte("output_delimiter", self.output_delimiter)?;
        if self.delimiter_candidates.is_empty() {
            return Err(config_error("delimiter_candidates must not be empty"));
        }
        for c in &self.delimiter_candidates {
            ascii_byte("delimiter_candidates", *c)?;
        }
        if !(0.0..=1.0).contains(&self.min_extract_success_ratio) {
            return Err(config_error(format!(
                "min_extract_success_ratio must be within [0, 1], got {}",
                self.min_extract_success_ratio
            )));
        }
        if self.sniff_sample_bytes == 0 {
            return Err(config_error("sniff_sample_bytes must be > 0"));
        }
        self.aggregation.validate()
    }

    pub fn period_dir(&self, period: &DatasetPeriod) -> PathBuf {
        self.root.join(period.as_str())
    }

    pub fn working_dir(&self, period: &DatasetPeriod) -> PathBuf {
        self.period_dir(period).join(&self.working_dir_name)
    }

    pub fn unified_artifact_path(&self, period: &DatasetPeriod) -> PathBuf {
        self.period_dir(period).join(&self.unified_artifact_name)
    }

    pub fn aggregated_artifact_path(&self, period: &DatasetPeriod) -> PathBuf {
        self.period_dir(period).join(&self.aggregated_artifact_name)
    }

    /// Output delimiter as a byte. Falls back to `;` for a config that skipped validation.
    pub fn output_delimiter_byte(&self) -> u8 {
        u8::try_from(self.output_delimiter).unwrap_or(b';')
    }

    /// Sniffer default as a byte. Falls back to `;` for a config that skipped validation.
    pub fn default_delimiter_byte(&self) -> u8 {
        u8::try_from(self.default_delimiter).unwrap_or(b';')
    }

    /// Sniffer candidates as bytes, non-ASCII entries dropped.
    pub fn delimiter_candidate_bytes(&self) -> Vec<u8> {
        self.delimiter_candidates
            .iter()
            .filter(|c| c.is_ascii())
            .filter_map(|c| u8::try_from(*c).ok())
            .collect()
    }
}

/// Column roles for the per-entity aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Entity key column.
    pub key: String,
    /// Columns keeping the first non-empty value per key.
    pub first_wins: Vec<String>,
    /// Columns collecting every distinct non-empty value per key.
    pub collect_distinct: Vec<String>,
    /// Separator used to join collect-distinct values.
    pub separator: String,
    /// Columns decoded as dictionary codes.
    pub categorical: Vec<String>,
    /// Columns decoded as floating point numbers.
    pub numeric: Vec<String>,
    /// Post-grouping filter; `None` keeps every entity.
    pub status_filter: Option<StatusFilter>,
}

/// Keeps only entities whose `column` equals `value` after grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFilter {
    pub column: String,
    pub value: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        let names = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            key: "cnpj_basico".to_string(),
            first_wins: names(&[
                "razao_social",
                "nome_fantasia",
                "matriz_filial",
                "situacao_cadastral",
                "data_inicio_atividade",
                "cnae_fiscal_principal",
                "natureza_juridica",
                "porte_empresa",
                "capital_social",
                "logradouro",
                "numero",
                "complemento",
                "bairro",
                "cep",
                "uf",
                "codigo_municipio",
                "ddd_1",
                "telefone_1",
                "correio_eletronico",
                "opcao_simples",
                "opcao_mei",
            ]),
            collect_distinct: names(&[
                "nome_socio",
                "qualificacao_socio",
                "cnae_fiscal_secundario",
            ]),
            separator: " | ".to_string(),
            categorical: names(&[
                "matriz_filial",
                "situacao_cadastral",
                "porte_empresa",
                "natureza_juridica",
                "uf",
                "opcao_simples",
                "opcao_mei",
            ]),
            numeric: names(&["capital_social"]),
            status_filter: Some(StatusFilter {
                column: "situacao_cadastral".to_string(),
                value: "02".to_string(),
            }),
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.key.is_empty() {
            return Err(config_error("aggregation.key must not be empty"));
        }
        for name in self.first_wins.iter().chain(&self.collect_distinct) {
            if *name == self.key {
                return Err(config_error(format!(
                    "aggregation key '{name}' cannot also be an aggregated column"
                )));
            }
        }
        if let Some(filter) = &self.status_filter {
            if !self.first_wins.contains(&filter.column) {
                return Err(config_error(format!(
                    "status filter column '{}' must be a first-wins column",
                    filter.column
                )));
            }
        }
        Ok(())
    }
}

fn ascii_byte(field: &str, c: char) -> PipelineResult<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(config_error(format!("{field} must be a single ASCII character, got {c:?}")))
    }
}

fn config_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Config {
        message: message.into(),
    }
}
