//! Schema-aware reconciliation for dimension tables.
//!
//! Dimensions are loaded as an append-only upsert: incoming rows are
//! projected onto the live table's schema, coerced to the declared column
//! types, and filtered down to the rows whose primary key is not already
//! present. Facts bypass this module entirely.
//!
//! Coercion is lossy-safe: a value that cannot be coerced to the declared
//! type becomes the null marker rather than failing the table.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use silt_core::error::Result;
use silt_core::frame::{ColumnType, Frame, TableDescriptor, Value};
use silt_core::warehouse::Warehouse;

/// Accepted textual timestamp shapes, tried in order.
const TEXT_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];
const TEXT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Reconciles an incoming dimension frame against the live table.
///
/// Steps: live descriptor fetch, descriptor-order projection, per-column
/// coercion, then a primary-key anti-join against the table's current key
/// values. The result is exactly what should be appended; an empty result
/// means nothing new for this table, not an error.
///
/// # Errors
///
/// Returns `Error::Warehouse` on any database-level fault during
/// inspection or the key read.
pub async fn reconcile(
    warehouse: &dyn Warehouse,
    table: &str,
    incoming: &Frame,
) -> Result<Frame> {
    // Step 1: live schema, never cached across runs.
    let descriptor = warehouse.describe_table(table).await?;

    // Steps 2-3: projection then coercion.
    let coerced = coerce_to_descriptor(incoming, &descriptor);

    // Steps 4-5: primary key is the first declared column; keep rows whose
    // key value is absent from the warehouse.
    let Some(pk) = descriptor.primary_key() else {
        tracing::warn!(table, "table has no columns, nothing to reconcile");
        return Ok(Frame::empty(Vec::new()));
    };

    let existing = warehouse.read_column(table, &pk.name).await?;
    let existing_keys: HashSet<String> =
        existing.iter().filter_map(Value::lookup_key).collect();

    let mut merged = coerced;
    merged.retain_rows(|row| match row.first().and_then(Value::lookup_key) {
        Some(key) => !existing_keys.contains(&key),
        // Null keys cannot be matched against the warehouse; keep the row.
        None => true,
    });

    tracing::info!(
        table,
        incoming = incoming.num_rows(),
        merged = merged.num_rows(),
        "reconciled dimension table"
    );
    Ok(merged)
}

/// Projects a frame onto a descriptor and coerces each column to its
/// declared type.
#[must_use]
pub fn coerce_to_descriptor(incoming: &Frame, descriptor: &TableDescriptor) -> Frame {
    let names = descriptor.column_names();
    let mut frame = incoming.project(&names);

    for column in &descriptor.columns {
        frame.map_column(&column.name, |value| coerce(value, column.column_type));
    }
    frame
}

/// Coerces one value to a declared column type.
///
/// The dispatch is exhaustive over [`ColumnType`]; unparseable temporal and
/// numeric values become [`Value::Null`].
#[must_use]
pub fn coerce(value: &Value, target: ColumnType) -> Value {
    match target {
        ColumnType::Temporal => coerce_temporal(value),
        ColumnType::Integer => coerce_integer(value),
        ColumnType::Float => coerce_float(value),
        ColumnType::Text => value
            .render_text()
            .map_or(Value::Null, Value::Text),
        ColumnType::Other => value.clone(),
    }
}

fn coerce_temporal(value: &Value) -> Value {
    match value {
        Value::Timestamp(ts) => Value::Timestamp(*ts),
        Value::Text(text) => parse_temporal_text(text).map_or(Value::Null, Value::Timestamp),
        Value::Null | Value::Int(_) | Value::Float(_) | Value::Bool(_) => Value::Null,
    }
}

fn parse_temporal_text(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    for format in TEXT_TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(trimmed, TEXT_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn coerce_integer(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Int(*i),
        // Narrow floats only when exact.
        Value::Float(f) if f.fract() == 0.0 && is_in_i64_range(*f) => {
            #[allow(clippy::cast_possible_truncation)]
            Value::Int(*f as i64)
        }
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_or(Value::Null, Value::Int),
        Value::Null
        | Value::Float(_)
        | Value::Bool(_)
        | Value::Timestamp(_) => Value::Null,
    }
}

#[allow(clippy::cast_precision_loss)]
fn is_in_i64_range(f: f64) -> bool {
    f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64
}

fn coerce_float(value: &Value) -> Value {
    match value {
        Value::Float(f) => Value::Float(*f),
        #[allow(clippy::cast_precision_loss)]
        Value::Int(i) => Value::Float(*i as f64),
        Value::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_or(Value::Null, Value::Float),
        Value::Null | Value::Bool(_) | Value::Timestamp(_) => Value::Null,
    }
}
