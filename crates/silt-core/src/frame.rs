//! Tabular frame model.
//!
//! A [`Frame`] is an ordered sequence of named columns plus an ordered
//! sequence of rows; both orders are preserved from the source. Frames are
//! used uniformly for staged payloads and for data read back from the
//! warehouse during reconciliation.
//!
//! Cell values and declared column types are closed tagged unions, matched
//! exhaustively wherever coercion dispatch happens.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Null / missing marker.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Timezone-naive timestamp (warehouse-local).
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true if the value is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical lookup key for primary-key comparison.
    ///
    /// Returns `None` for null values: a null key is never considered
    /// already-present in the warehouse. Floats are keyed on their bit
    /// pattern so the key is `Eq`/`Hash`-safe.
    #[must_use]
    pub fn lookup_key(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(format!("i:{v}")),
            Self::Float(v) => Some(format!("f:{:016x}", v.to_bits())),
            Self::Text(v) => Some(format!("s:{v}")),
            Self::Bool(v) => Some(format!("b:{v}")),
            Self::Timestamp(v) => Some(format!("t:{}", v.and_utc().timestamp_micros())),
        }
    }

    /// Renders the value as text, for unconditional stringification.
    ///
    /// Null has no text rendering and returns `None`.
    #[must_use]
    pub fn render_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Text(v) => Some(v.clone()),
            Self::Bool(v) => Some(v.to_string()),
            Self::Timestamp(v) => Some(v.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// Semantic type declared for a warehouse column.
///
/// Replaces type-name string comparison with a closed union so coercion
/// dispatch is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Date/time column.
    Temporal,
    /// Integer-typed column.
    Integer,
    /// Floating-point column.
    Float,
    /// Text column.
    Text,
    /// Any other declared type; values pass through unmodified.
    Other,
}

/// A column's name and declared semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared semantic type.
    pub column_type: ColumnType,
}

impl ColumnDef {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Per-table destination metadata, read from the warehouse at write time.
///
/// Never cached across runs: table schemas may evolve between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Destination table name.
    pub name: String,
    /// Schema/namespace qualifier applied to all managed tables.
    pub schema: Option<String>,
    /// Columns in declared order.
    pub columns: Vec<ColumnDef>,
}

impl TableDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Option<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            schema,
            columns,
        }
    }

    /// The assumed primary-key column: the first column in declared order.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.first()
    }

    /// Column names in declared order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// An ordered, named-column tabular structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Creates a frame, validating that every row matches the column count.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any row width differs from the
    /// number of columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let width = columns.len();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::InvalidInput(format!(
                    "row {idx} has {} values, expected {width}",
                    row.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Creates an empty frame with the given columns.
    #[must_use]
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// True when the frame holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column, if present.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Projects the frame down to exactly the given columns, in the given
    /// order.
    ///
    /// Incoming columns not in `names` are dropped; that is not an error.
    /// A requested column missing from the frame yields nulls for every
    /// row, so the projected shape always matches the descriptor.
    #[must_use]
    pub fn project(&self, names: &[&str]) -> Self {
        let indices: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.map_or(Value::Null, |i| row[i].clone()))
                    .collect()
            })
            .collect();

        Self {
            columns: names.iter().map(|n| (*n).to_string()).collect(),
            rows,
        }
    }

    /// Applies a per-value transform to one column in place.
    ///
    /// No-op if the column is absent.
    pub fn map_column(&mut self, name: &str, f: impl Fn(&Value) -> Value) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Keeps only the rows for which the predicate returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Value]) -> bool) {
        self.rows.retain(|row| keep(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Frame {
        Frame::new(
            vec!["id".into(), "code".into(), "rate".into()],
            vec![
                vec![Value::Int(1), Value::Text("GBP".into()), Value::Float(1.0)],
                vec![Value::Int(2), Value::Text("USD".into()), Value::Float(0.8)],
            ],
        )
        .expect("valid frame")
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Frame::new(
            vec!["id".into(), "code".into()],
            vec![vec![Value::Int(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn project_reorders_and_drops() {
        let frame = sample();
        let projected = frame.project(&["code", "id"]);
        assert_eq!(projected.columns(), &["code".to_string(), "id".to_string()]);
        assert_eq!(
            projected.rows()[0],
            vec![Value::Text("GBP".into()), Value::Int(1)]
        );
    }

    #[test]
    fn project_fills_missing_columns_with_null() {
        let frame = sample();
        let projected = frame.project(&["id", "absent"]);
        assert_eq!(projected.rows()[1], vec![Value::Int(2), Value::Null]);
    }

    #[test]
    fn lookup_key_distinguishes_types() {
        assert_ne!(
            Value::Int(1).lookup_key(),
            Value::Text("1".into()).lookup_key()
        );
        assert_eq!(Value::Null.lookup_key(), None);
    }

    #[test]
    fn render_text_formats_timestamps() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            Value::Timestamp(ts).render_text().as_deref(),
            Some("2024-01-02 03:04:05")
        );
    }

    #[test]
    fn primary_key_is_first_declared_column() {
        let desc = TableDescriptor::new(
            "currency",
            None,
            vec![
                ColumnDef::new("currency_id", ColumnType::Integer),
                ColumnDef::new("code", ColumnType::Text),
            ],
        );
        assert_eq!(desc.primary_key().map(|c| c.name.as_str()), Some("currency_id"));
    }
}
