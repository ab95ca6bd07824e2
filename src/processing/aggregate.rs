//! Per-entity aggregation of the unified artifact.
//!
//! Rows are grouped by the configured key. First-wins columns keep the first non-null value seen
//! for the key; collect-distinct columns keep every distinct non-empty value in first-seen order,
//! joined with the configured separator. Only the groups are held in memory; the artifact itself
//! is streamed.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::{AggregationConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::filter::filter_eq;
use super::load::TypedCsvReader;

/// Counters describing one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
    pub rows_read: u64,
    /// Rows skipped because the key cell was empty.
    pub dropped_empty_key: u64,
    /// Numeric cells that failed to parse and were stored as null.
    pub coerced_nulls: u64,
    /// Distinct keys before the status filter.
    pub groups: u64,
    /// Entities removed by the status filter.
    pub filtered_out: u64,
}

/// Aggregated entities plus the counters of the run that produced them.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub dataset: DataSet,
    pub summary: AggregationSummary,
}

#[derive(Debug, Default)]
struct DistinctValues {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl DistinctValues {
    fn push(&mut self, value: &str) {
        if !self.seen.contains(value) {
            self.seen.insert(value.to_owned());
            self.ordered.push(value.to_owned());
        }
    }
}

#[derive(Debug)]
struct EntityGroup {
    key: String,
    first: Vec<Value>,
    distinct: Vec<DistinctValues>,
}

#[derive(Debug, Clone)]
pub struct AggregationEngine {
    config: AggregationConfig,
    delimiter: u8,
}

impl AggregationEngine {
    pub fn new(config: AggregationConfig, delimiter: u8) -> Self {
        Self { config, delimiter }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.aggregation.clone(), config.output_delimiter_byte())
    }

    /// Output columns: key, first-wins columns, collect-distinct columns, in configured order.
    pub fn output_schema(&self) -> Schema {
        let mut fields = Vec::with_capacity(
            1 + self.config.first_wins.len() + self.config.collect_distinct.len(),
        );
        fields.push(Field::new(&self.config.key, DataType::Utf8));
        for name in &self.config.first_wins {
            fields.push(Field::new(name, self.first_wins_type(name)));
        }
        for name in &self.config.collect_distinct {
            fields.push(Field::new(name, DataType::Utf8));
        }
        Schema::new(fields)
    }

    fn first_wins_type(&self, name: &str) -> DataType {
        if self.config.categorical.iter().any(|c| c == name) {
            DataType::Categorical
        } else if self.config.numeric.iter().any(|c| c == name) {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    }

    /// Groups the unified artifact by entity key and applies the status filter.
    ///
    /// Fails with [`PipelineError::Load`] if the artifact is missing, lacks a configured column,
    /// holds a malformed record, has no data rows, or overflows a categorical dictionary.
    #[instrument(level = "info", skip(self, artifact), fields(artifact = %artifact.display()))]
    pub fn aggregate(&self, artifact: &Path) -> PipelineResult<Aggregated> {
        self.config.validate()?;
        let schema = self.output_schema();
        let first_count = self.config.first_wins.len();
        let distinct_count = self.config.collect_distinct.len();

        let mut reader = TypedCsvReader::open(artifact, self.delimiter, schema.fields.clone())?;
        let mut summary = AggregationSummary::default();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<EntityGroup> = Vec::new();
        let mut row = Vec::with_capacity(schema.fields.len());

        while reader.next_row(&mut row)? {
            let key = match &row[0] {
                Value::Utf8(k) => k.as_str(),
                _ => {
                    summary.dropped_empty_key += 1;
                    continue;
                }
            };
            let slot = match index.get(key) {
                Some(&slot) => slot,
                None => {
                    index.insert(key.to_owned(), groups.len());
                    groups.push(EntityGroup {
                        key: key.to_owned(),
                        first: vec![Value::Null; first_count],
                        distinct: (0..distinct_count).map(|_| DistinctValues::default()).collect(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];

            for (i, value) in row[1..=first_count].iter().enumerate() {
                if group.first[i].is_null() && !value.is_null() {
                    group.first[i] = value.clone();
                }
            }
            for (i, value) in row[1 + first_count..].iter().enumerate() {
                if let Value::Utf8(s) = value {
                    group.distinct[i].push(s);
                }
            }
        }

        let stats = reader.stats();
        summary.rows_read = stats.rows_read;
        summary.coerced_nulls = stats.coerced_nulls;
        summary.groups = groups.len() as u64;
        if stats.rows_read == 0 {
            return Err(PipelineError::load(artifact, "artifact holds no data rows"));
        }

        let rows = groups
            .into_iter()
            .map(|g| {
                let mut out = Vec::with_capacity(schema.fields.len());
                out.push(Value::Utf8(g.key));
                out.extend(g.first);
                out.extend(g.distinct.into_iter().map(|d| {
                    if d.ordered.is_empty() {
                        Value::Null
                    } else {
                        Value::Utf8(d.ordered.join(&self.config.separator))
                    }
                }));
                out
            })
            .collect();
        let grouped = DataSet::with_dictionaries(schema, rows, reader.into_dictionaries());

        let dataset = match &self.config.status_filter {
            Some(f) => filter_eq(&grouped, &f.column, &f.value).ok_or_else(|| {
                PipelineError::load(
                    artifact,
                    format!("status column '{}' is not aggregated", f.column),
                )
            })?,
            None => grouped,
        };
        summary.filtered_out = summary.groups - dataset.row_count() as u64;

        info!(
            rows_read = summary.rows_read,
            groups = summary.groups,
            kept = dataset.row_count(),
            dropped_empty_key = summary.dropped_empty_key,
            coerced_nulls = summary.coerced_nulls,
            "aggregation finished"
        );
        Ok(Aggregated { dataset, summary })
    }

    /// Writes `dataset` as delimited text with a header row, replacing `path`.
    pub fn write_csv(&self, dataset: &DataSet, path: &Path) -> PipelineResult<()> {
        let out = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        let to_io = |e: csv::Error| PipelineError::io(path, std::io::Error::from(e));

        writer
            .write_record(dataset.schema.field_names())
            .map_err(to_io)?;
        for row in &dataset.rows {
            let rendered = row
                .iter()
                .enumerate()
                .map(|(i, v)| dataset.render(i, v).into_owned());
            writer.write_record(rendered).map_err(to_io)?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AggregationEngine;
    use crate::config::{AggregationConfig, StatusFilter};
    use crate::types::Value;
    use std::fs;

    fn config() -> AggregationConfig {
        AggregationConfig {
            key: "cnpj_basico".into(),
            first_wins: vec!["razao_social".into(), "situacao_cadastral".into()],
            collect_distinct: vec!["nome_socio".into()],
            separator: " | ".into(),
            categorical: vec!["situacao_cadastral".into()],
            numeric: vec![],
            status_filter: None,
        }
    }

    fn write(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("unified.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn first_non_null_wins_and_distinct_values_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "cnpj_basico;razao_social;situacao_cadastral;nome_socio;TABELA_ORIGEM\n\
             10000000;;;B;SOCIO\n\
             20000000;OTHER;08;;EMPRE\n\
             10000000;ACME;02;;EMPRE\n\
             10000000;LATER;08;A;SOCIO\n\
             10000000;;;B;SOCIO\n",
        );
        let engine = AggregationEngine::new(config(), b';');
        let out = engine.aggregate(&path).unwrap();

        let ds = &out.dataset;
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.cell_text(0, "cnpj_basico").as_deref(), Some("10000000"));
        assert_eq!(ds.cell_text(0, "razao_social").as_deref(), Some("ACME"));
        assert_eq!(ds.cell_text(0, "situacao_cadastral").as_deref(), Some("02"));
        assert_eq!(ds.cell_text(0, "nome_socio").as_deref(), Some("B | A"));
        assert_eq!(ds.rows[1][3], Value::Null);
        assert_eq!(out.summary.groups, 2);
        assert_eq!(out.summary.rows_read, 5);
    }

    #[test]
    fn empty_keys_are_dropped_and_status_filter_applies_after_grouping() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "cnpj_basico;razao_social;situacao_cadastral;nome_socio\n\
             ;ORPHAN;02;X\n\
             30000000;;;Z\n\
             30000000;ACTIVE CO;02;\n\
             40000000;CLOSED CO;08;\n",
        );
        let engine = AggregationEngine::new(
            AggregationConfig {
                status_filter: Some(StatusFilter {
                    column: "situacao_cadastral".into(),
                    value: "02".into(),
                }),
                ..config()
            },
            b';',
        );
        let out = engine.aggregate(&path).unwrap();
        assert_eq!(out.summary.dropped_empty_key, 1);
        assert_eq!(out.summary.groups, 2);
        assert_eq!(out.summary.filtered_out, 1);
        assert_eq!(out.dataset.row_count(), 1);
        assert_eq!(out.dataset.cell_text(0, "nome_socio").as_deref(), Some("Z"));
    }

    #[test]
    fn write_csv_renders_dictionary_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "cnpj_basico;razao_social;situacao_cadastral;nome_socio\n\
             00000001;A;B;02;\n",
        );
        // Record wider than the header.
        let engine = AggregationEngine::new(config(), b';');
        assert!(engine.aggregate(&path).is_err());

        let path = write(
            dir.path(),
            "cnpj_basico;razao_social;situacao_cadastral;nome_socio\n\
             00000001;\"A;B\";02;\n",
        );
        let out = engine.aggregate(&path).unwrap();
        let target = dir.path().join("agg.csv");
        engine.write_csv(&out.dataset, &target).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "cnpj_basico;razao_social;situacao_cadastral;nome_socio\n00000001;\"A;B\";02;\n"
        );
    }

    #[test]
    fn header_only_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "cnpj_basico;razao_social;situacao_cadastral;nome_socio\n");
        let err = AggregationEngine::new(config(), b';').aggregate(&path).unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }
}
