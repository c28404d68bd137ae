//! Load run configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Behavior when the watermark marker is absent (first-ever run).
///
/// Either choice is defensible, so it is an explicit configuration rather
/// than an inferred default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstRunPolicy {
    /// Select no files on a first run (conservative fail-closed).
    FailClosed,
    /// Select every staged file on a first run (full backfill).
    Backfill,
}

impl Default for FirstRunPolicy {
    fn default() -> Self {
        Self::FailClosed
    }
}

/// Configuration for a load run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Key of the watermark marker object.
    pub marker_key: String,

    /// Prefix to list staged objects under (empty = whole bucket).
    #[serde(default)]
    pub list_prefix: String,

    /// First-run behavior when no watermark exists yet.
    #[serde(default)]
    pub first_run: FirstRunPolicy,

    /// Schema/namespace qualifier applied to all managed warehouse tables.
    #[serde(default)]
    pub schema: Option<String>,

    /// Secrets-manager name of the warehouse credentials.
    pub secret_name: String,

    /// Secrets-manager region.
    pub secret_region: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            marker_key: default_marker_key(),
            list_prefix: String::new(),
            first_run: FirstRunPolicy::FailClosed,
            schema: None,
            secret_name: "warehouse-db-login".to_string(),
            secret_region: "eu-west-2".to_string(),
        }
    }
}

fn default_marker_key() -> String {
    "last_load.txt".to_string()
}

impl LoadConfig {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `SILT_MARKER_KEY`
    /// - `SILT_LIST_PREFIX`
    /// - `SILT_FIRST_RUN` (`fail_closed` | `backfill`)
    /// - `SILT_SCHEMA`
    /// - `SILT_SECRET_NAME`
    /// - `SILT_SECRET_REGION`
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(key) = env_string("SILT_MARKER_KEY") {
            config.marker_key = key;
        }
        if let Some(prefix) = env_string("SILT_LIST_PREFIX") {
            config.list_prefix = prefix;
        }
        if let Some(policy) = env_string("SILT_FIRST_RUN") {
            config.first_run = parse_first_run("SILT_FIRST_RUN", &policy)?;
        }
        if let Some(schema) = env_string("SILT_SCHEMA") {
            config.schema = Some(schema);
        }
        if let Some(name) = env_string("SILT_SECRET_NAME") {
            config.secret_name = name;
        }
        if let Some(region) = env_string("SILT_SECRET_REGION") {
            config.secret_region = region;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_first_run(name: &str, value: &str) -> Result<FirstRunPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fail_closed" => Ok(FirstRunPolicy::FailClosed),
        "backfill" => Ok(FirstRunPolicy::Backfill),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be one of: fail_closed, backfill (got {value})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fail_closed() {
        let config = LoadConfig::default();
        assert_eq!(config.first_run, FirstRunPolicy::FailClosed);
        assert_eq!(config.marker_key, "last_load.txt");
    }

    #[test]
    fn parse_first_run_accepts_both_policies() -> Result<()> {
        assert_eq!(
            parse_first_run("TEST", "fail_closed")?,
            FirstRunPolicy::FailClosed
        );
        assert_eq!(
            parse_first_run("TEST", "BACKFILL")?,
            FirstRunPolicy::Backfill
        );
        Ok(())
    }

    #[test]
    fn parse_first_run_rejects_unknown_policy() {
        let err = parse_first_run("TEST", "maybe").unwrap_err();
        let Error::InvalidInput(message) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("TEST"));
        assert!(message.contains("maybe"));
    }
}
