//! Warehouse access abstraction.
//!
//! The warehouse is a relational interface exposed at three narrow points:
//! live table introspection, bulk read of one column's values, and bulk
//! append of rows inside a per-call transactional scope. Real drivers
//! implement [`Warehouse`]; [`MemoryWarehouse`] serves tests and records
//! the order of table writes so ordering invariants can be asserted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::frame::{ColumnDef, Frame, TableDescriptor, Value};

/// Relational warehouse interface.
#[async_trait]
pub trait Warehouse: Send + Sync + 'static {
    /// Inspects the live table and returns its descriptor.
    ///
    /// Called at write time on every run; descriptors are never cached
    /// across runs because schemas may evolve between runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Warehouse` if the table is missing or inspection
    /// fails.
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor>;

    /// Reads every value of one column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Warehouse` on any database-level fault.
    async fn read_column(&self, table: &str, column: &str) -> Result<Vec<Value>>;

    /// Appends rows to a table inside a single transactional scope.
    ///
    /// Existing rows are never deleted or rewritten. A failure here does
    /// not roll back writes already committed to other tables.
    ///
    /// # Errors
    ///
    /// Returns `Error::Warehouse` on any database-level fault; no rows are
    /// appended in that case.
    async fn append_rows(&self, table: &str, frame: &Frame) -> Result<u64>;
}

/// In-memory warehouse for testing.
///
/// Tables are declared up front with their column types; appends are
/// validated against the declared shape. Per-table failure injection
/// simulates a faulted connection mid-batch.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    schema: Option<String>,
    tables: HashMap<String, TableState>,
    append_log: Vec<String>,
    fail_tables: HashSet<String>,
}

#[derive(Debug)]
struct TableState {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl MemoryWarehouse {
    /// Creates a new empty warehouse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a warehouse whose tables carry a schema qualifier.
    #[must_use]
    pub fn with_schema(schema: impl Into<String>) -> Self {
        let wh = Self::default();
        if let Ok(mut inner) = wh.inner.write() {
            inner.schema = Some(schema.into());
        }
        wh
    }

    /// Declares a table with the given columns and seed rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the backing lock is poisoned.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDef>,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        let mut inner = self.lock_mut()?;
        inner
            .tables
            .insert(name.to_string(), TableState { columns, rows });
        Ok(())
    }

    /// Makes every subsequent operation against `table` fail.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the backing lock is poisoned.
    pub fn fail_table(&self, table: &str) -> Result<()> {
        self.lock_mut()?.fail_tables.insert(table.to_string());
        Ok(())
    }

    /// Rows currently stored for a table, for assertions.
    ///
    /// # Errors
    ///
    /// Returns `Error::Warehouse` if the table does not exist.
    pub fn rows(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let inner = self.lock()?;
        inner
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| Error::warehouse(format!("no such table: {table}")))
    }

    /// The sequence of table names appended to, in write order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the backing lock is poisoned.
    pub fn append_log(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.append_log.clone())
    }

    fn lock(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::internal("lock poisoned"))
    }

    fn lock_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::internal("lock poisoned"))
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor> {
        let inner = self.lock()?;
        if inner.fail_tables.contains(table) {
            return Err(Error::warehouse(format!("connection fault on {table}")));
        }
        let state = inner
            .tables
            .get(table)
            .ok_or_else(|| Error::warehouse(format!("no such table: {table}")))?;
        Ok(TableDescriptor::new(
            table,
            inner.schema.clone(),
            state.columns.clone(),
        ))
    }

    async fn read_column(&self, table: &str, column: &str) -> Result<Vec<Value>> {
        let inner = self.lock()?;
        if inner.fail_tables.contains(table) {
            return Err(Error::warehouse(format!("connection fault on {table}")));
        }
        let state = inner
            .tables
            .get(table)
            .ok_or_else(|| Error::warehouse(format!("no such table: {table}")))?;
        let idx = state
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| Error::warehouse(format!("no such column: {table}.{column}")))?;
        Ok(state.rows.iter().map(|row| row[idx].clone()).collect())
    }

    async fn append_rows(&self, table: &str, frame: &Frame) -> Result<u64> {
        let mut inner = self.lock_mut()?;
        if inner.fail_tables.contains(table) {
            return Err(Error::warehouse(format!("connection fault on {table}")));
        }
        let state = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::warehouse(format!("no such table: {table}")))?;

        if frame.columns().len() != state.columns.len() {
            return Err(Error::warehouse(format!(
                "column count mismatch for {table}: frame has {}, table has {}",
                frame.columns().len(),
                state.columns.len()
            )));
        }

        for row in frame.rows() {
            state.rows.push(row.clone());
        }
        let written = frame.num_rows() as u64;
        inner.append_log.push(table.to_string());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColumnType;

    fn currency_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("currency_id", ColumnType::Integer),
            ColumnDef::new("code", ColumnType::Text),
        ]
    }

    #[tokio::test]
    async fn describe_reads_live_schema() {
        let wh = MemoryWarehouse::with_schema("project");
        wh.create_table("currency", currency_columns(), Vec::new())
            .expect("create table");

        let desc = wh
            .describe_table("currency")
            .await
            .expect("describe should succeed");
        assert_eq!(desc.schema.as_deref(), Some("project"));
        assert_eq!(desc.primary_key().map(|c| c.name.as_str()), Some("currency_id"));
    }

    #[tokio::test]
    async fn append_records_write_order() {
        let wh = MemoryWarehouse::new();
        wh.create_table("currency", currency_columns(), Vec::new())
            .expect("create table");
        wh.create_table("design", currency_columns(), Vec::new())
            .expect("create table");

        let frame = Frame::new(
            vec!["currency_id".into(), "code".into()],
            vec![vec![Value::Int(1), Value::Text("GBP".into())]],
        )
        .expect("valid frame");

        wh.append_rows("design", &frame).await.expect("append");
        wh.append_rows("currency", &frame).await.expect("append");

        assert_eq!(
            wh.append_log().expect("log"),
            vec!["design".to_string(), "currency".to_string()]
        );
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_warehouse_error() {
        let wh = MemoryWarehouse::new();
        wh.create_table("currency", currency_columns(), Vec::new())
            .expect("create table");
        wh.fail_table("currency").expect("fail_table");

        let err = wh.describe_table("currency").await.unwrap_err();
        assert!(matches!(err, Error::Warehouse { .. }));
    }

    #[tokio::test]
    async fn append_rejects_shape_mismatch() {
        let wh = MemoryWarehouse::new();
        wh.create_table("currency", currency_columns(), Vec::new())
            .expect("create table");

        let narrow = Frame::new(vec!["currency_id".into()], vec![vec![Value::Int(1)]])
            .expect("valid frame");
        let err = wh.append_rows("currency", &narrow).await.unwrap_err();
        assert!(matches!(err, Error::Warehouse { .. }));
    }
}
