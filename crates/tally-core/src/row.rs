//! # Row Flattening
//!
//! Turns nested records into flat, column-keyed rows.
//!
//! ## Flattening Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  { "dbId": 1,                          "dbId"             → 1           │
//! │    "company": {                        "company.name"     → "Acme"      │
//! │        "name": "Acme",         ──►     "company.address.zipCode"        │
//! │        "address": { "zipCode": "N1" }                     → "N1"        │
//! │    },                                  "lines.0.amount"   → 10          │
//! │    "lines": [ { "amount": 10 } ] }                                      │
//! │                                                                         │
//! │  • objects contribute `parent.child`                                    │
//! │  • arrays contribute `parent.<index>` (positional, 0-based)             │
//! │  • scalars and nulls terminate at their full path                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Array positions are not semantically stable column names. The upstream
//! schema rarely nests record lists, so positional names are accepted.

use std::collections::BTreeMap;

use crate::value::{Scalar, Value};

/// Separator between path segments of a flattened column name.
pub const PATH_SEPARATOR: char = '.';

/// A flattened record: dot-joined field path → scalar (or null).
pub type Row = BTreeMap<String, Option<Scalar>>;

/// Flattens one record into a row.
pub fn flatten(record: &Value) -> Row {
    let mut row = Row::new();
    flatten_into(record, "", &mut row);
    row
}

/// Flattens every record, preserving order.
pub fn flatten_all(records: &[Value]) -> Vec<Row> {
    records.iter().map(flatten).collect()
}

fn flatten_into(value: &Value, prefix: &str, row: &mut Row) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, &join(prefix, key), row);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, &join(prefix, &index.to_string()), row);
            }
        }
        Value::Null => {
            row.insert(prefix.to_string(), None);
        }
        Value::Scalar(scalar) => {
            row.insert(prefix.to_string(), Some(scalar.clone()));
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, segment)
    }
}

/// Restricts a row to `columns`: missing columns become null, extra keys
/// are dropped.
pub fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|column| (column.clone(), row.get(column).cloned().flatten()))
        .collect()
}
