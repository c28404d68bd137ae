//! Warehouse write sequencing.
//!
//! All dimension tables for a run are written before any fact table: fact
//! rows may reference dimension keys that must already exist. Each table
//! write is its own transactional scope, so one table's failure never rolls
//! back a previously committed table.
//!
//! Per-table faults are collected into explicit [`TableOutcome`] records
//! instead of being thrown; the orchestrator owns the abort-vs-continue
//! decision.

use serde::Serialize;
use tracing::Instrument;

use silt_core::error::Error;
use silt_core::frame::Frame;
use silt_core::observability::table_span;
use silt_core::warehouse::Warehouse;

use crate::detect::TableKind;
use crate::reconcile;

/// Outcome of one table's write.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    /// Destination table name.
    pub table: String,
    /// Dimension or fact.
    pub kind: String,
    /// Rows actually written (post-merge for dimensions).
    pub rows_written: u64,
    /// Failure description, if the table's write failed.
    pub error: Option<String>,
}

impl TableOutcome {
    fn written(table: &str, kind: TableKind, rows_written: u64) -> Self {
        Self {
            table: table.to_string(),
            kind: kind.to_string(),
            rows_written,
            error: None,
        }
    }

    fn failed(table: &str, kind: TableKind, error: &Error) -> Self {
        Self {
            table: table.to_string(),
            kind: kind.to_string(),
            rows_written: 0,
            error: Some(error.to_string()),
        }
    }

    /// True when this table's write succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Writes one dimension table: reconcile, then append the merge result.
///
/// Any warehouse fault is captured in the outcome; the caller continues
/// with the remaining tables.
pub async fn write_dimension(
    warehouse: &dyn Warehouse,
    table: &str,
    incoming: &Frame,
) -> TableOutcome {
    let span = table_span("dimension_write", table);
    write_dimension_inner(warehouse, table, incoming)
        .instrument(span)
        .await
}

async fn write_dimension_inner(
    warehouse: &dyn Warehouse,
    table: &str,
    incoming: &Frame,
) -> TableOutcome {
    let merged = match reconcile::reconcile(warehouse, table, incoming).await {
        Ok(merged) => merged,
        Err(e) => {
            tracing::error!(table, error = %e, "dimension reconciliation failed");
            return TableOutcome::failed(table, TableKind::Dimension, &e);
        }
    };

    if merged.is_empty() {
        tracing::info!(table, "no new dimension rows");
        return TableOutcome::written(table, TableKind::Dimension, 0);
    }

    match warehouse.append_rows(table, &merged).await {
        Ok(rows) => {
            tracing::info!(table, rows, "new data added to dimension table");
            TableOutcome::written(table, TableKind::Dimension, rows)
        }
        Err(e) => {
            tracing::error!(table, error = %e, "dimension write failed");
            TableOutcome::failed(table, TableKind::Dimension, &e)
        }
    }
}

/// Writes one fact table: append the entire frame unconditionally.
///
/// Facts are assumed immutable/append-only; there is no dedup pass.
pub async fn write_fact(warehouse: &dyn Warehouse, table: &str, incoming: &Frame) -> TableOutcome {
    let span = table_span("fact_write", table);
    write_fact_inner(warehouse, table, incoming)
        .instrument(span)
        .await
}

async fn write_fact_inner(
    warehouse: &dyn Warehouse,
    table: &str,
    incoming: &Frame,
) -> TableOutcome {
    match warehouse.append_rows(table, incoming).await {
        Ok(rows) => {
            tracing::info!(table, rows, "new data added to fact table");
            TableOutcome::written(table, TableKind::Fact, rows)
        }
        Err(e) => {
            tracing::error!(table, error = %e, "fact write failed");
            TableOutcome::failed(table, TableKind::Fact, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_core::frame::{ColumnDef, ColumnType, Value};
    use silt_core::warehouse::MemoryWarehouse;

    fn currency_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("currency_id", ColumnType::Integer),
            ColumnDef::new("code", ColumnType::Text),
        ]
    }

    fn currency_frame() -> Frame {
        Frame::new(
            vec!["currency_id".into(), "code".into()],
            vec![
                vec![Value::Int(1), Value::Text("GBP".into())],
                vec![Value::Int(2), Value::Text("USD".into())],
            ],
        )
        .expect("valid frame")
    }

    #[tokio::test]
    async fn dimension_write_appends_only_new_keys() {
        let wh = MemoryWarehouse::new();
        wh.create_table(
            "dim_currency",
            currency_columns(),
            vec![vec![Value::Int(1), Value::Text("GBP".into())]],
        )
        .expect("create table");

        let outcome = write_dimension(&wh, "dim_currency", &currency_frame()).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.rows_written, 1);

        let rows = wh.rows("dim_currency").expect("rows");
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn fact_write_appends_everything() {
        let wh = MemoryWarehouse::new();
        wh.create_table("fact_sales", currency_columns(), Vec::new())
            .expect("create table");

        let outcome = write_fact(&wh, "fact_sales", &currency_frame()).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.rows_written, 2);
    }

    #[tokio::test]
    async fn warehouse_fault_is_captured_not_thrown() {
        let wh = MemoryWarehouse::new();
        wh.create_table("dim_currency", currency_columns(), Vec::new())
            .expect("create table");
        wh.fail_table("dim_currency").expect("fail_table");

        let outcome = write_dimension(&wh, "dim_currency", &currency_frame()).await;
        assert!(!outcome.is_ok());
        assert_eq!(outcome.rows_written, 0);
    }
}
