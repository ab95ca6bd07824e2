//! Typed, streaming decoding of the unified artifact.
//!
//! Rules:
//!
//! - The artifact must have a header row containing every requested field (order can differ).
//! - Every record must be as wide as the header.
//! - Empty cells decode to [`Value::Null`].
//! - [`DataType::Float64`] accepts a decimal comma; unparsable numbers become `Null` and are
//!   counted in [`LoadStats::coerced_nulls`].
//! - [`DataType::Categorical`] cells are interned into a per-column [`Dictionary`].

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Dictionary, Field, Schema, Value};

/// Counters collected while decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: u64,
    pub coerced_nulls: u64,
}

/// Reads typed rows one at a time, holding only the current record and the dictionaries.
#[derive(Debug)]
pub struct TypedCsvReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    schema: Schema,
    col_idxs: Vec<usize>,
    dictionaries: Vec<Dictionary>,
    record: csv::StringRecord,
    stats: LoadStats,
}

impl TypedCsvReader {
    /// Opens `path` and resolves `fields` against its header.
    pub fn open(path: impl AsRef<Path>, delimiter: u8, fields: Vec<Field>) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::load(path, "artifact does not exist"));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .from_path(path)
            .map_err(|e| PipelineError::load(path, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::load(path, e.to_string()))?
            .clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(PipelineError::load(path, "artifact has no header row"));
        }

        let mut col_idxs = Vec::with_capacity(fields.len());
        for field in &fields {
            match headers.iter().position(|h| h == field.name) {
                Some(idx) => col_idxs.push(idx),
                None => {
                    return Err(PipelineError::load(
                        path,
                        format!(
                            "missing required column '{}'. headers={:?}",
                            field.name,
                            headers.iter().collect::<Vec<_>>()
                        ),
                    ));
                }
            }
        }

        let dictionaries = vec![Dictionary::new(); fields.len()];
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            schema: Schema::new(fields),
            col_idxs,
            dictionaries,
            record: csv::StringRecord::new(),
            stats: LoadStats::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    pub fn dictionaries(&self) -> &[Dictionary] {
        &self.dictionaries
    }

    pub fn into_dictionaries(self) -> Vec<Dictionary> {
        self.dictionaries
    }

    /// Decodes the next record into `row`, replacing its contents. Returns `false` at the end of
    /// the file.
    pub fn next_row(&mut self, row: &mut Vec<Value>) -> PipelineResult<bool> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| PipelineError::load(&self.path, e.to_string()))?;
        if !more {
            return Ok(false);
        }
        self.stats.rows_read += 1;
        // Header is line 1.
        let line = self.stats.rows_read + 1;

        row.clear();
        for (i, (field, &csv_idx)) in self.schema.fields.iter().zip(&self.col_idxs).enumerate() {
            let raw = self.record.get(csv_idx).unwrap_or("");
            let value = match parse_typed_value(raw, field.data_type, &mut self.dictionaries[i]) {
                Parsed::Value(v) => v,
                Parsed::Coerced => {
                    self.stats.coerced_nulls += 1;
                    Value::Null
                }
                Parsed::DictionaryFull => {
                    return Err(PipelineError::load(
                        &self.path,
                        format!(
                            "line {line}: categorical column '{}' exceeds {} distinct values",
                            field.name,
                            u16::MAX as usize + 1
                        ),
                    ));
                }
            };
            row.push(value);
        }
        Ok(true)
    }
}

/// Loads the requested fields of a delimited file into memory.
pub fn load_dataset(
    path: impl AsRef<Path>,
    delimiter: u8,
    fields: Vec<Field>,
) -> PipelineResult<DataSet> {
    let mut reader = TypedCsvReader::open(path, delimiter, fields)?;
    let mut rows = Vec::new();
    let mut row = Vec::new();
    while reader.next_row(&mut row)? {
        rows.push(std::mem::take(&mut row));
    }
    let schema = reader.schema().clone();
    Ok(DataSet::with_dictionaries(schema, rows, reader.into_dictionaries()))
}

enum Parsed {
    Value(Value),
    Coerced,
    DictionaryFull,
}

fn parse_typed_value(raw: &str, data_type: DataType, dictionary: &mut Dictionary) -> Parsed {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Parsed::Value(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Parsed::Value(Value::Utf8(trimmed.to_owned())),
        DataType::Float64 => match parse_decimal(trimmed) {
            Some(v) => Parsed::Value(Value::Float64(v)),
            None => Parsed::Coerced,
        },
        DataType::Categorical => match dictionary.intern(trimmed) {
            Some(code) => Parsed::Value(Value::Categorical(code)),
            None => Parsed::DictionaryFull,
        },
    }
}

/// Parses `1234.5` or `1234,5`. A value holding both separators is rejected.
fn parse_decimal(s: &str) -> Option<f64> {
    if s.contains(',') && s.contains('.') {
        return None;
    }
    let v = s.replace(',', ".").parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::{load_dataset, parse_decimal, TypedCsvReader};
    use crate::error::PipelineError;
    use crate::types::{DataType, Field, Value};
    use std::fs;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("cnpj_basico", DataType::Utf8),
            Field::new("uf", DataType::Categorical),
            Field::new("capital_social", DataType::Float64),
        ]
    }

    #[test]
    fn decodes_typed_columns_in_requested_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        fs::write(
            &path,
            "capital_social;cnpj_basico;uf;TABELA_ORIGEM\n1000,50;00012345;SP;EMPRE\n;00099999;RJ;ESTABELE\nabc;00012345;SP;EMPRE\n",
        )
        .unwrap();

        let mut reader = TypedCsvReader::open(&path, b';', fields()).unwrap();
        let mut row = Vec::new();
        assert!(reader.next_row(&mut row).unwrap());
        assert_eq!(
            row,
            vec![Value::Utf8("00012345".into()), Value::Categorical(0), Value::Float64(1000.5)]
        );
        assert!(reader.next_row(&mut row).unwrap());
        assert_eq!(row[1], Value::Categorical(1));
        assert_eq!(row[2], Value::Null);
        assert!(reader.next_row(&mut row).unwrap());
        assert_eq!(row[1], Value::Categorical(0));
        assert_eq!(row[2], Value::Null);
        assert!(!reader.next_row(&mut row).unwrap());

        assert_eq!(reader.stats().rows_read, 3);
        assert_eq!(reader.stats().coerced_nulls, 1);
        assert_eq!(reader.dictionaries()[1].resolve(1), Some("RJ"));
    }

    #[test]
    fn missing_column_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        fs::write(&path, "cnpj_basico;uf\n1;SP\n").unwrap();
        let err = TypedCsvReader::open(&path, b';', fields()).unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
        assert!(err.to_string().contains("capital_social"));
    }

    #[test]
    fn ragged_record_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        fs::write(&path, "cnpj_basico;uf;capital_social\n1;SP;10\n2;RJ\n").unwrap();
        let err = load_dataset(&path, b';', fields()).unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn missing_or_empty_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_dataset(dir.path().join("absent.csv"), b';', fields()).unwrap_err();
        assert!(matches!(missing, PipelineError::Load { .. }));

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        let err = load_dataset(&empty, b';', fields()).unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn categorical_overflow_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        let mut body = String::from("cnpj_basico\n");
        for i in 0..=(u16::MAX as u32 + 1) {
            body.push_str(&format!("{i}\n"));
        }
        fs::write(&path, body).unwrap();

        let err = load_dataset(&path, b';', vec![Field::new("cnpj_basico", DataType::Categorical)])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
        assert!(err.to_string().contains("65536"));
    }

    #[test]
    fn decimal_comma_and_point() {
        assert_eq!(parse_decimal("1,5"), Some(1.5));
        assert_eq!(parse_decimal("2.25"), Some(2.25));
        assert_eq!(parse_decimal("1.000,00"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("x"), None);
    }
}
