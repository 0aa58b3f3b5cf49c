//! # Columnar Serialization
//!
//! Projects flattened rows onto the declared columns and encodes them as a
//! Parquet blob.
//!
//! ## Column Types
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Inferred per column from its non-null values:                         │
//! │                                                                         │
//! │    all Bool               → Boolean                                     │
//! │    all Int                → Int64                                       │
//! │    Int and Float          → Float64                                     │
//! │    anything else / no     → Utf8   (non-text scalars rendered as text) │
//! │    values                                                               │
//! │                                                                         │
//! │  Every column is nullable: a field absent from a record (deletion      │
//! │  stubs, sparse nested objects) is a null cell.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use arrow_array::builder::{BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use tally_core::{project, Row, Scalar, PARQUET_EXTENSION};

// =============================================================================
// Encoder Trait
// =============================================================================

/// Serializes rows with a fixed column set into a byte blob.
pub trait RowEncoder: Send + Sync {
    /// Encodes `rows` projected onto `columns`, in column order.
    fn encode(&self, rows: &[Row], columns: &[String]) -> SyncResult<Vec<u8>>;

    /// File extension of the produced blobs.
    fn extension(&self) -> &'static str;
}

// =============================================================================
// Parquet
// =============================================================================

/// Snappy-compressed Parquet, one row group per blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetEncoder;

impl RowEncoder for ParquetEncoder {
    fn encode(&self, rows: &[Row], columns: &[String]) -> SyncResult<Vec<u8>> {
        validate_columns(columns)?;

        let projected: Vec<Row> = rows.iter().map(|row| project(row, columns)).collect();

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        for column in columns {
            let cells: Vec<Option<&Scalar>> = projected
                .iter()
                .map(|row| row.get(column).and_then(Option::as_ref))
                .collect();
            let column_type = ColumnType::infer(cells.iter().flatten().copied());

            fields.push(Field::new(column.as_str(), column_type.data_type(), true));
            arrays.push(column_type.build(&cells));
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(buffer)
    }

    fn extension(&self) -> &'static str {
        PARQUET_EXTENSION
    }
}

fn validate_columns(columns: &[String]) -> SyncResult<()> {
    if columns.is_empty() {
        return Err(SyncError::Serialization("No columns declared".into()));
    }

    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(SyncError::Serialization(format!(
                "Duplicate column: '{}'",
                column
            )));
        }
    }

    Ok(())
}

// =============================================================================
// Type Inference
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnType {
    fn of(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Bool(_) => ColumnType::Boolean,
            Scalar::Int(_) => ColumnType::Int64,
            Scalar::Float(_) => ColumnType::Float64,
            Scalar::Text(_) => ColumnType::Utf8,
        }
    }

    fn widen(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => Utf8,
        }
    }

    fn infer<'a>(mut values: impl Iterator<Item = &'a Scalar>) -> Self {
        let Some(first) = values.next() else {
            return ColumnType::Utf8;
        };
        values.fold(Self::of(first), |acc, value| acc.widen(Self::of(value)))
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }

    fn build(self, cells: &[Option<&Scalar>]) -> ArrayRef {
        match self {
            ColumnType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(cells.len());
                for cell in cells {
                    builder.append_option(match cell {
                        Some(Scalar::Bool(b)) => Some(*b),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            ColumnType::Int64 => {
                let mut builder = Int64Builder::with_capacity(cells.len());
                for cell in cells {
                    builder.append_option(match cell {
                        Some(Scalar::Int(i)) => Some(*i),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            ColumnType::Float64 => {
                let mut builder = Float64Builder::with_capacity(cells.len());
                for cell in cells {
                    builder.append_option(match cell {
                        Some(Scalar::Float(x)) => Some(*x),
                        Some(Scalar::Int(i)) => Some(*i as f64),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            ColumnType::Utf8 => {
                let mut builder = StringBuilder::new();
                for cell in cells {
                    match cell {
                        Some(scalar) => builder.append_value(scalar.to_string()),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, Float64Array, Int64Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;
    use tally_core::{flatten, Value};

    fn decode(blob: Vec<u8>) -> RecordBatch {
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(blob))
            .unwrap()
            .build()
            .unwrap();
        reader.next().unwrap().unwrap()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_projection_drops_extra_fields() {
        let record = Value::from(json!({ "a": 1, "b": { "c": 2, "d": 3 }, "e": 4 }));
        let blob = ParquetEncoder
            .encode(&[flatten(&record)], &columns(&["a", "b.c"]))
            .unwrap();

        let batch = decode(blob);
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 2);

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["a", "b.c"]);

        let a = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        let bc = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(a.value(0), 1);
        assert_eq!(bc.value(0), 2);
    }

    #[test]
    fn test_missing_fields_are_null() {
        let full = Value::from(json!({ "dbId": 10, "name": "Acme", "mutationType": "ADDED" }));
        let stub = Value::from(json!({ "dbId": 30, "mutationType": "DELETED" }));
        let blob = ParquetEncoder
            .encode(
                &[flatten(&full), flatten(&stub)],
                &columns(&["dbId", "name", "mutationType"]),
            )
            .unwrap();

        let batch = decode(blob);
        let name = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(name.value(0), "Acme");
        assert!(name.is_null(1));

        let kind = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(kind.value(1), "DELETED");
    }

    #[test]
    fn test_type_widening() {
        let rows = vec![
            flatten(&Value::from(json!({ "amount": 1, "code": 7 }))),
            flatten(&Value::from(json!({ "amount": 2.5, "code": "X7" }))),
        ];
        let batch = decode(
            ParquetEncoder
                .encode(&rows, &columns(&["amount", "code"]))
                .unwrap(),
        );

        let amount = batch.column(0).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(amount.value(0), 1.0);
        assert_eq!(amount.value(1), 2.5);

        let code = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(code.value(0), "7");
        assert_eq!(code.value(1), "X7");
    }

    #[test]
    fn test_invalid_columns() {
        let row = flatten(&Value::from(json!({ "a": 1 })));
        assert!(ParquetEncoder
            .encode(&[row.clone()], &[])
            .unwrap_err()
            .is_serialization_error());
        assert!(ParquetEncoder
            .encode(&[row], &columns(&["a", "a"]))
            .unwrap_err()
            .is_serialization_error());
    }

    #[test]
    fn test_all_null_column_is_text() {
        assert_eq!(ColumnType::infer(std::iter::empty()), ColumnType::Utf8);
        assert_eq!(
            ColumnType::infer([Scalar::Bool(true), Scalar::Bool(false)].iter()),
            ColumnType::Boolean
        );
        assert_eq!(
            ColumnType::infer([Scalar::Bool(true), Scalar::Int(1)].iter()),
            ColumnType::Utf8
        );
    }
}
