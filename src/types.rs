//! Core data model types.
//!
//! [`DatasetPeriod`] identifies a release of the registry export. The remaining types form the
//! typed in-memory model used when the unified artifact is decoded for aggregation: a
//! [`Schema`] of typed [`Field`]s, rows of [`Value`]s, and per-column [`Dictionary`] tables for
//! categorical columns.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PERIOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("period pattern is a valid regex"));

/// Release identifier of the export, formatted `YYYY-MM`.
///
/// Ordering is lexicographic, which matches chronological order because both parts are
/// zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetPeriod(String);

impl DatasetPeriod {
    /// Returns `true` if `name` has the `YYYY-MM` shape.
    pub fn is_period_name(name: &str) -> bool {
        PERIOD_PATTERN.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DatasetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_period_name(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("'{s}' is not a YYYY-MM period"))
        }
    }
}

impl TryFrom<String> for DatasetPeriod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DatasetPeriod> for String {
    fn from(value: DatasetPeriod) -> Self {
        value.0
    }
}

impl fmt::Display for DatasetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 text, kept verbatim (identifiers keep their leading zeros).
    Utf8,
    /// Low-cardinality text stored as a code into a per-column [`Dictionary`].
    Categorical,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Code into the column's [`Dictionary`].
    Categorical(u16),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Interning table for a categorical column.
///
/// Codes are assigned in first-seen order and are bounded by `u16`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    values: Vec<String>,
    index: HashMap<String, u16>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the code for `value`, assigning a new one if needed.
    ///
    /// Returns `None` once the dictionary already holds `u16::MAX + 1` distinct values.
    pub fn intern(&mut self, value: &str) -> Option<u16> {
        if let Some(code) = self.index.get(value) {
            return Some(*code);
        }
        let code = u16::try_from(self.values.len()).ok()?;
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), code);
        Some(code)
    }

    /// Looks up an existing code without inserting.
    pub fn code_of(&self, value: &str) -> Option<u16> {
        self.index.get(value).copied()
    }

    pub fn resolve(&self, code: u16) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
/// `dictionaries` is aligned with the schema; non-categorical columns carry an empty dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
    /// Per-column dictionaries for [`DataType::Categorical`] fields.
    pub dictionaries: Vec<Dictionary>,
}

impl DataSet {
    /// Create a dataset from schema and rows, with empty dictionaries.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        let dictionaries = vec![Dictionary::new(); schema.fields.len()];
        Self {
            schema,
            rows,
            dictionaries,
        }
    }

    /// Create a dataset that already carries categorical dictionaries.
    ///
    /// # Panics
    ///
    /// Panics if `dictionaries` is not aligned with the schema fields.
    pub fn with_dictionaries(
        schema: Schema,
        rows: Vec<Vec<Value>>,
        dictionaries: Vec<Dictionary>,
    ) -> Self {
        assert!(
            dictionaries.len() == schema.fields.len(),
            "dictionary count {} does not match schema length {}",
            dictionaries.len(),
            schema.fields.len()
        );
        Self {
            schema,
            rows,
            dictionaries,
        }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders a value of column `col` as text. Null renders as the empty string.
    pub fn render<'a>(&'a self, col: usize, value: &'a Value) -> Cow<'a, str> {
        match value {
            Value::Null => Cow::Borrowed(""),
            Value::Utf8(s) => Cow::Borrowed(s.as_str()),
            Value::Float64(v) => Cow::Owned(v.to_string()),
            Value::Categorical(code) => self
                .dictionaries
                .get(col)
                .and_then(|d| d.resolve(*code))
                .map(Cow::Borrowed)
                .unwrap_or(Cow::Borrowed("")),
        }
    }

    /// Text of the cell at (`row`, `column`), or `None` if either does not exist.
    pub fn cell_text(&self, row: usize, column: &str) -> Option<Cow<'_, str>> {
        let col = self.schema.index_of(column)?;
        let value = self.rows.get(row)?.get(col)?;
        Some(self.render(col, value))
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema and dictionaries.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
            dictionaries: self.dictionaries.clone(),
        }
    }
}
