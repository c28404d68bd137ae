//! # silt-load
//!
//! The incremental staging-to-warehouse load pipeline:
//!
//! - **Watermark Store**: the last-successful-run marker in the staging store
//! - **Change Detector**: watermark filter + dimension/fact classification
//! - **Stage Reader**: parquet payload materialization into frames
//! - **Reconciler**: live-schema projection, coercion, primary-key anti-join
//! - **Writer**: dimensions-before-facts sequencing with per-table outcomes
//! - **Loader**: the run orchestrator and its report
//!
//! Data flow: the change detector consumes the watermark store's current
//! value and partitions the staged listing; the stage reader materializes
//! tabular frames; the reconciler merges dimensions against warehouse
//! state; the writer commits; the orchestrator advances the watermark only
//! on full success.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod detect;
pub mod reader;
pub mod reconcile;
pub mod run;
pub mod watermark;
pub mod writer;

pub use detect::{detect_changes, PendingFiles, StagedFile, TableKind};
pub use run::{warehouse_dsn, Loader, RunReport};
pub use watermark::WatermarkStore;
pub use writer::TableOutcome;
