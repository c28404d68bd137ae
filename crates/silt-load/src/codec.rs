//! Parquet encoding/decoding for staged table payloads.
//!
//! Staged objects are compact columnar parquet files, one per table per
//! run. The codec round-trips column names, column order, row order, and
//! null markers through a [`Frame`]. Decoding is schema-agnostic: whatever
//! columns the payload carries become frame columns.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, StringArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use silt_core::error::{Error, Result};
use silt_core::frame::{Frame, Value};

/// Decodes a parquet payload into a frame.
///
/// # Errors
///
/// Returns `Error::Decode` if the bytes are not a valid parquet payload.
pub fn decode_frame(bytes: &Bytes) -> Result<Frame> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| Error::decode(format!("parquet reader init failed: {e}")))?;

    // Column names come from the file schema so an empty payload still
    // yields the right frame shape.
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let reader = builder
        .build()
        .map_err(|e| Error::decode(format!("parquet reader build failed: {e}")))?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::decode(format!("parquet read batch failed: {e}")))?;
        append_batch_rows(&batch, &mut rows)?;
    }

    Frame::new(columns, rows)
}

fn append_batch_rows(batch: &RecordBatch, rows: &mut Vec<Vec<Value>>) -> Result<()> {
    let width = batch.num_columns();
    for row_idx in 0..batch.num_rows() {
        let mut row = Vec::with_capacity(width);
        for col_idx in 0..width {
            row.push(decode_cell(batch.column(col_idx), row_idx)?);
        }
        rows.push(row);
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn decode_cell(array: &ArrayRef, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Utf8 => Value::Text(downcast::<StringArray>(array)?.value(row).to_string()),
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int8 => Value::Int(i64::from(downcast::<Int8Array>(array)?.value(row))),
        DataType::Int16 => Value::Int(i64::from(downcast::<Int16Array>(array)?.value(row))),
        DataType::Int32 => Value::Int(i64::from(downcast::<Int32Array>(array)?.value(row))),
        DataType::Int64 => Value::Int(downcast::<Int64Array>(array)?.value(row)),
        DataType::Float32 => Value::Float(f64::from(downcast::<Float32Array>(array)?.value(row))),
        DataType::Float64 => Value::Float(downcast::<Float64Array>(array)?.value(row)),
        DataType::Timestamp(TimeUnit::Second, _) => timestamp_value(
            DateTime::from_timestamp(downcast::<TimestampSecondArray>(array)?.value(row), 0),
        )?,
        DataType::Timestamp(TimeUnit::Millisecond, _) => timestamp_value(
            DateTime::from_timestamp_millis(
                downcast::<TimestampMillisecondArray>(array)?.value(row),
            ),
        )?,
        DataType::Timestamp(TimeUnit::Microsecond, _) => timestamp_value(
            DateTime::from_timestamp_micros(
                downcast::<TimestampMicrosecondArray>(array)?.value(row),
            ),
        )?,
        DataType::Timestamp(TimeUnit::Nanosecond, _) => timestamp_value(Some(
            DateTime::from_timestamp_nanos(
                downcast::<TimestampNanosecondArray>(array)?.value(row),
            ),
        ))?,
        DataType::Date32 => {
            let days = downcast::<Date32Array>(array)?.value(row);
            timestamp_value(DateTime::from_timestamp(i64::from(days) * 86_400, 0))?
        }
        other => {
            tracing::warn!(data_type = %other, "unsupported staged column type, decoding as null");
            Value::Null
        }
    };
    Ok(value)
}

fn timestamp_value(ts: Option<DateTime<chrono::Utc>>) -> Result<Value> {
    ts.map(|t| Value::Timestamp(t.naive_utc()))
        .ok_or_else(|| Error::decode("timestamp out of range".to_string()))
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::decode("column array type mismatch".to_string()))
}

/// Encodes a frame as a parquet payload.
///
/// The arrow type of each column is inferred from its first non-null value;
/// all-null columns encode as nullable text. Used by staging producers and
/// test fixtures.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if a column mixes value variants, or
/// `Error::Decode` if the parquet write itself fails.
pub fn encode_frame(frame: &Frame) -> Result<Bytes> {
    let mut fields = Vec::with_capacity(frame.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.columns().len());

    for (idx, name) in frame.columns().iter().enumerate() {
        let cells: Vec<&Value> = frame.rows().iter().map(|row| &row[idx]).collect();
        let (data_type, array) = encode_column(name, &cells)?;
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| Error::decode(format!("record batch build failed: {e}")))?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(props))
        .map_err(|e| Error::decode(format!("parquet writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::decode(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::decode(format!("parquet close failed: {e}")))?;

    Ok(Bytes::from(cursor.into_inner()))
}

fn encode_column(name: &str, cells: &[&Value]) -> Result<(DataType, ArrayRef)> {
    let template = cells.iter().find(|v| !v.is_null());

    let result: (DataType, ArrayRef) = match template {
        None | Some(Value::Text(_)) => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Text(s) => Ok(Some(s.clone())),
                    other => Err(mixed_column(name, other)),
                })
                .collect::<Result<_>>()?;
            (DataType::Utf8, Arc::new(StringArray::from(values)) as ArrayRef)
        }
        Some(Value::Int(_)) => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i)),
                    other => Err(mixed_column(name, other)),
                })
                .collect::<Result<_>>()?;
            (DataType::Int64, Arc::new(Int64Array::from(values)) as ArrayRef)
        }
        Some(Value::Float(_)) => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Float(f) => Ok(Some(*f)),
                    other => Err(mixed_column(name, other)),
                })
                .collect::<Result<_>>()?;
            (DataType::Float64, Arc::new(Float64Array::from(values)) as ArrayRef)
        }
        Some(Value::Bool(_)) => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Bool(b) => Ok(Some(*b)),
                    other => Err(mixed_column(name, other)),
                })
                .collect::<Result<_>>()?;
            (DataType::Boolean, Arc::new(BooleanArray::from(values)) as ArrayRef)
        }
        Some(Value::Timestamp(_)) => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Timestamp(t) => Ok(Some(t.and_utc().timestamp_micros())),
                    other => Err(mixed_column(name, other)),
                })
                .collect::<Result<_>>()?;
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(values)) as ArrayRef,
            )
        }
        Some(Value::Null) => unreachable!("template is non-null by construction"),
    };
    Ok(result)
}

fn mixed_column(name: &str, value: &Value) -> Error {
    Error::InvalidInput(format!(
        "column '{name}' mixes value variants (unexpected {value:?})"
    ))
}
