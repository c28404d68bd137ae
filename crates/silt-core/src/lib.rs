//! # silt-core
//!
//! Shared primitives for the silt incremental staging-to-warehouse loader:
//!
//! - **Tabular Frame**: ordered named columns + rows, the uniform shape for
//!   staged payloads and warehouse reads
//! - **Storage Trait**: the staging object-store seam (`list`/`get`/`put`)
//! - **Warehouse Trait**: table introspection, bulk column read, bulk append
//! - **Secrets Trait**: warehouse credential retrieval
//! - **Error Types**: the shared failure taxonomy and result alias
//!
//! External collaborators (the real object store, relational driver, and
//! secrets manager) live behind these traits; in-memory implementations
//! back the test suites.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod frame;
pub mod observability;
pub mod secrets;
pub mod storage;
pub mod warehouse;

pub use config::{FirstRunPolicy, LoadConfig};
pub use error::{Error, Result};
pub use frame::{ColumnDef, ColumnType, Frame, TableDescriptor, Value};
pub use observability::{init_logging, LogFormat};
pub use secrets::{MemorySecrets, SecretsProvider, WarehouseCredentials};
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend};
pub use warehouse::{MemoryWarehouse, Warehouse};
