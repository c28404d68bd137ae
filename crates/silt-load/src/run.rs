//! Run orchestration.
//!
//! One [`Loader::run`] drives the whole pipeline: read watermark, detect
//! changes, materialize staged frames, reconcile and write dimensions,
//! write facts, then advance the watermark. The watermark is an explicit
//! value threaded through the run and reported back, not ambient state.
//!
//! Fault policy: listing, retrieval, and decode faults abort the run with
//! the watermark untouched, so the same window is reprocessed next run
//! (at-least-once delivery). A warehouse fault on one table does not abort
//! the batch, but the watermark is only advanced when every table
//! succeeded: a partial advance would silently drop the unfinished table's
//! window forever. Dimension dedup makes the retry safe; a crash after a
//! partial fact write still duplicates fact rows on retry, which is a known
//! limitation of the append-only fact path.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::Instrument;

use silt_core::config::LoadConfig;
use silt_core::error::Result;
use silt_core::frame::Frame;
use silt_core::observability::run_span;
use silt_core::secrets::SecretsProvider;
use silt_core::storage::StorageBackend;
use silt_core::warehouse::Warehouse;

use crate::detect::{self, StagedFile};
use crate::reader;
use crate::watermark::WatermarkStore;
use crate::writer::{self, TableOutcome};

/// Summary of one load run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started; also the watermark value written on success.
    pub started_at: DateTime<Utc>,
    /// Watermark read at run start, if any.
    pub watermark_before: Option<DateTime<FixedOffset>>,
    /// Whether the watermark was advanced at run end.
    pub watermark_advanced: bool,
    /// Per-table outcomes, dimensions first, in processing order.
    pub tables: Vec<TableOutcome>,
}

impl RunReport {
    /// True when every processed table succeeded.
    #[must_use]
    pub fn all_tables_ok(&self) -> bool {
        self.tables.iter().all(TableOutcome::is_ok)
    }
}

/// The run orchestrator.
///
/// Single-threaded, single-run-at-a-time; not reentrant-safe against
/// itself. Two concurrent runs racing on the same marker can both select
/// overlapping windows and the last writer's watermark wins — callers
/// needing concurrency must hold an external mutual-exclusion lock for the
/// run's duration.
pub struct Loader {
    storage: Arc<dyn StorageBackend>,
    warehouse: Arc<dyn Warehouse>,
    config: LoadConfig,
    watermarks: WatermarkStore,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Creates a loader over injected storage and warehouse handles.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        warehouse: Arc<dyn Warehouse>,
        config: LoadConfig,
    ) -> Self {
        let watermarks = WatermarkStore::new(storage.clone(), config.marker_key.clone());
        Self {
            storage,
            warehouse,
            config,
            watermarks,
        }
    }

    /// Executes one load run.
    ///
    /// # Errors
    ///
    /// Returns listing, retrieval, or decode errors, all of which abort the
    /// run before the watermark is advanced. Per-table warehouse faults do
    /// not error; they are reported in the [`RunReport`].
    pub async fn run(&self) -> Result<RunReport> {
        let span = run_span("load", &self.config.marker_key);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunReport> {
        // The new watermark is the run start time captured before listing:
        // objects arriving mid-run stay above it and are picked up next run.
        let started_at = Utc::now();
        let watermark_before = self.watermarks.read().await?;

        let listing = self.storage.list(&self.config.list_prefix).await?;
        let pending = detect::detect_changes(&listing, watermark_before, self.config.first_run);

        if pending.is_empty() {
            tracing::info!("no new staged files");
            self.watermarks.write(started_at).await?;
            return Ok(RunReport {
                started_at,
                watermark_before,
                watermark_advanced: true,
                tables: Vec::new(),
            });
        }

        // Materialize every selected payload before touching the warehouse;
        // an unreadable file aborts the run rather than slipping behind the
        // advancing watermark.
        let dimension_frames = self.read_all(&pending.dimensions).await?;
        let fact_frames = self.read_all(&pending.facts).await?;

        let mut tables = Vec::with_capacity(dimension_frames.len() + fact_frames.len());

        // Dimensions strictly before facts: fact rows may reference
        // dimension keys that must already exist.
        for (file, frame) in &dimension_frames {
            tables.push(writer::write_dimension(self.warehouse.as_ref(), &file.table, frame).await);
        }
        for (file, frame) in &fact_frames {
            tables.push(writer::write_fact(self.warehouse.as_ref(), &file.table, frame).await);
        }

        let all_ok = tables.iter().all(TableOutcome::is_ok);
        if all_ok {
            self.watermarks.write(started_at).await?;
        } else {
            tracing::warn!(
                failed = tables.iter().filter(|t| !t.is_ok()).count(),
                "table failures, watermark not advanced; window will be retried"
            );
        }

        Ok(RunReport {
            started_at,
            watermark_before,
            watermark_advanced: all_ok,
            tables,
        })
    }

    async fn read_all(&self, files: &[StagedFile]) -> Result<Vec<(StagedFile, Frame)>> {
        let mut frames = Vec::with_capacity(files.len());
        for file in files {
            let frame = reader::read_frame(self.storage.as_ref(), &file.key).await?;
            frames.push((file.clone(), frame));
        }
        Ok(frames)
    }
}

/// Resolves the warehouse connection string through the secrets store.
///
/// Called at run startup before any pipeline work; any retrieval fault is
/// fatal for the run.
///
/// # Errors
///
/// Returns `Error::Secret` if the secret cannot be retrieved.
pub async fn warehouse_dsn(
    secrets: &dyn SecretsProvider,
    config: &LoadConfig,
) -> Result<String> {
    let credentials = secrets
        .get_secret(&config.secret_name, &config.secret_region)
        .await?;
    Ok(credentials.dsn())
}
