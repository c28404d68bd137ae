//! Change detection over the staging listing.
//!
//! Filters the staged-object listing down to objects newer than the
//! watermark and classifies them by naming convention into dimension and
//! fact table groups. Keys matching neither convention are excluded from
//! both lists; that is deliberate behavior, not an oversight.

use chrono::{DateTime, FixedOffset};

use silt_core::config::FirstRunPolicy;
use silt_core::storage::ObjectMeta;

/// Key substring marking a dimension table payload.
const DIM_MARKER: &str = "dim_";
/// Key substring marking a fact table payload.
const FACT_MARKER: &str = "fact_";
/// File extension of the watermark marker object.
const MARKER_EXTENSION: &str = ".txt";

/// Kind of a staged table payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Reference/lookup table, loaded via dedup-append.
    Dimension,
    /// Event/transaction table, strictly append-only.
    Fact,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dimension => write!(f, "dimension"),
            Self::Fact => write!(f, "fact"),
        }
    }
}

/// One staged table payload selected for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Destination table name derived from the key.
    pub table: String,
    /// Staging store key.
    pub key: String,
}

/// The partitioned selection for one run, in listing order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFiles {
    /// Dimension payloads; always processed before facts downstream.
    pub dimensions: Vec<StagedFile>,
    /// Fact payloads.
    pub facts: Vec<StagedFile>,
}

impl PendingFiles {
    /// True when nothing passed the filter; the run short-circuits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.facts.is_empty()
    }
}

/// Selects and classifies staged objects newer than the watermark.
///
/// With no watermark the behavior follows `first_run`: `FailClosed`
/// selects nothing, `Backfill` selects everything. Objects are kept when
/// `last_modified` is strictly greater than the watermark and the key does
/// not denote the marker file.
#[must_use]
pub fn detect_changes(
    listing: &[ObjectMeta],
    watermark: Option<DateTime<FixedOffset>>,
    first_run: FirstRunPolicy,
) -> PendingFiles {
    let mut pending = PendingFiles::default();

    for object in listing {
        if is_marker(&object.key) {
            continue;
        }
        match watermark {
            Some(mark) => {
                if object.last_modified <= mark {
                    continue;
                }
            }
            None => {
                if first_run == FirstRunPolicy::FailClosed {
                    continue;
                }
            }
        }

        match classify(&object.key) {
            Some(TableKind::Dimension) => pending.dimensions.push(StagedFile {
                table: table_name(&object.key),
                key: object.key.clone(),
            }),
            Some(TableKind::Fact) => pending.facts.push(StagedFile {
                table: table_name(&object.key),
                key: object.key.clone(),
            }),
            // Neither convention: excluded from both lists.
            None => {
                tracing::debug!(key = %object.key, "staged key matches no table convention");
            }
        }
    }

    tracing::info!(
        dimensions = pending.dimensions.len(),
        facts = pending.facts.len(),
        "change detection complete"
    );
    pending
}

/// Classifies a key by its naming convention.
#[must_use]
pub fn classify(key: &str) -> Option<TableKind> {
    if key.contains(DIM_MARKER) {
        Some(TableKind::Dimension)
    } else if key.contains(FACT_MARKER) {
        Some(TableKind::Fact)
    } else {
        None
    }
}

/// Derives the destination table name from a staged key.
///
/// The key is truncated at the first `.` and then at the first `/`, so both
/// `dim_currency.parquet` and `dim_currency/2024-01-01.parquet` map to
/// `dim_currency`.
#[must_use]
pub fn table_name(key: &str) -> String {
    let before_extension = key.split('.').next().unwrap_or(key);
    let before_separator = before_extension.split('/').next().unwrap_or(before_extension);
    before_separator.to_string()
}

fn is_marker(key: &str) -> bool {
    key.ends_with(MARKER_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn meta(key: &str, hour: u32) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: 0,
            last_modified: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    fn watermark(hour: u32) -> Option<DateTime<FixedOffset>> {
        Some(
            Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0)
                .unwrap()
                .fixed_offset(),
        )
    }

    #[test]
    fn filters_strictly_newer_than_watermark() {
        let listing = vec![
            meta("dim_currency.parquet", 1),
            meta("dim_design.parquet", 2),
            meta("fact_sales.parquet", 3),
        ];
        let pending = detect_changes(&listing, watermark(2), FirstRunPolicy::FailClosed);

        assert!(pending.dimensions.is_empty());
        assert_eq!(pending.facts.len(), 1);
        assert_eq!(pending.facts[0].table, "fact_sales");
    }

    #[test]
    fn marker_file_is_never_selected() {
        let listing = vec![meta("last_load.txt", 5)];
        let pending = detect_changes(&listing, watermark(1), FirstRunPolicy::FailClosed);
        assert!(pending.is_empty());
    }

    #[test]
    fn unmatched_keys_are_excluded_from_both_lists() {
        let listing = vec![
            meta("dim_currency.parquet", 5),
            meta("fact_sales.parquet", 5),
            meta("staging_notes.parquet", 5),
        ];
        let pending = detect_changes(&listing, watermark(1), FirstRunPolicy::FailClosed);

        assert_eq!(pending.dimensions.len(), 1);
        assert_eq!(pending.facts.len(), 1);
    }

    #[test]
    fn first_run_fail_closed_selects_nothing() {
        let listing = vec![meta("dim_currency.parquet", 5)];
        let pending = detect_changes(&listing, None, FirstRunPolicy::FailClosed);
        assert!(pending.is_empty());
    }

    #[test]
    fn first_run_backfill_selects_everything() {
        let listing = vec![
            meta("dim_currency.parquet", 5),
            meta("fact_sales.parquet", 5),
        ];
        let pending = detect_changes(&listing, None, FirstRunPolicy::Backfill);
        assert_eq!(pending.dimensions.len(), 1);
        assert_eq!(pending.facts.len(), 1);
    }

    #[test]
    fn table_name_strips_extension_then_path() {
        assert_eq!(table_name("dim_currency.parquet"), "dim_currency");
        assert_eq!(table_name("dim_currency/2024.parquet"), "dim_currency");
        assert_eq!(table_name("fact_sales"), "fact_sales");
    }

    #[test]
    fn listing_order_is_preserved_per_kind() {
        let listing = vec![
            meta("dim_design.parquet", 5),
            meta("fact_sales.parquet", 5),
            meta("dim_currency.parquet", 5),
        ];
        let pending = detect_changes(&listing, watermark(1), FirstRunPolicy::FailClosed);
        let names: Vec<&str> = pending.dimensions.iter().map(|f| f.table.as_str()).collect();
        assert_eq!(names, vec!["dim_design", "dim_currency"]);
    }
}
