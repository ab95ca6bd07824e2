//! Row filtering for [`crate::types::DataSet`].

use crate::types::{DataSet, DataType, Value};

/// Returns a new [`DataSet`] containing only rows for which `predicate` returns `true`.
///
/// This is a convenience wrapper around [`DataSet::filter_rows`].
pub fn filter<F>(dataset: &DataSet, predicate: F) -> DataSet
where
    F: FnMut(&[Value]) -> bool,
{
    dataset.filter_rows(predicate)
}

/// Keeps rows whose `column` renders exactly as `expected`.
///
/// Categorical columns are compared by dictionary code. Returns `None` if `column` does not
/// exist.
pub fn filter_eq(dataset: &DataSet, column: &str, expected: &str) -> Option<DataSet> {
    let idx = dataset.schema.index_of(column)?;
    let field = &dataset.schema.fields[idx];

    let out = match field.data_type {
        DataType::Categorical => {
            let code = dataset.dictionaries.get(idx).and_then(|d| d.code_of(expected));
            filter(dataset, |row| match (row.get(idx), code) {
                (Some(Value::Categorical(c)), Some(want)) => *c == want,
                _ => false,
            })
        }
        DataType::Utf8 => filter(dataset, |row| {
            matches!(row.get(idx), Some(Value::Utf8(s)) if s == expected)
        }),
        DataType::Float64 => filter(dataset, |row| {
            row.get(idx)
                .is_some_and(|v| !v.is_null() && dataset.render(idx, v) == expected)
        }),
    };
    Some(out)
}
