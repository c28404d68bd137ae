//! Error types and result alias shared across the silt crates.
//!
//! The taxonomy mirrors the failure surfaces of a load run: secret
//! retrieval, storage listing/retrieval, payload decoding, and warehouse
//! access each get their own variant so callers can apply different
//! policies per failure class.

use thiserror::Error;

/// The result type used throughout silt.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a load run.
#[derive(Debug, Error)]
pub enum Error {
    /// Warehouse credentials could not be retrieved.
    ///
    /// Fatal: the run aborts before any pipeline work.
    #[error("secret retrieval error: {message}")]
    Secret {
        /// Description of the retrieval failure.
        message: String,
    },

    /// Listing the staging store failed.
    #[error("listing error: {message}")]
    Listing {
        /// Description of the listing failure.
        message: String,
    },

    /// A staged object could not be fetched (store unreachable or faulted).
    #[error("retrieval error: {message}")]
    Retrieval {
        /// Description of the retrieval failure.
        message: String,
    },

    /// A requested object does not exist.
    ///
    /// Kept separate from [`Error::Retrieval`] so the watermark store can
    /// treat an absent marker as a first run rather than a fault.
    #[error("not found: {0}")]
    NotFound(String),

    /// A staged payload could not be decoded.
    ///
    /// Never silently skipped: a skipped file would fall permanently behind
    /// the advancing watermark.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// A warehouse inspection, read, or write failed.
    #[error("warehouse error: {message}")]
    Warehouse {
        /// Description of the warehouse failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new secret retrieval error.
    #[must_use]
    pub fn secret(message: impl Into<String>) -> Self {
        Self::Secret {
            message: message.into(),
        }
    }

    /// Creates a new listing error.
    #[must_use]
    pub fn listing(message: impl Into<String>) -> Self {
        Self::Listing {
            message: message.into(),
        }
    }

    /// Creates a new retrieval error.
    #[must_use]
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Creates a new decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a new warehouse error.
    #[must_use]
    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::Warehouse {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
