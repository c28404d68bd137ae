//! Observability infrastructure.
//!
//! Structured logging with consistent spans across pipeline runs. User-
//! visible failure surfaces as a structured log entry; there is no separate
//! alerting channel.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at startup. Safe to call multiple times; subsequent calls are
/// no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `silt_load=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one load run with standard fields.
#[must_use]
pub fn run_span(operation: &str, marker_key: &str) -> Span {
    tracing::info_span!("load_run", op = operation, marker = marker_key)
}

/// Creates a span for one table's load with standard fields.
#[must_use]
pub fn table_span(operation: &str, table: &str) -> Span {
    tracing::info_span!("table_load", op = operation, table = table)
}
