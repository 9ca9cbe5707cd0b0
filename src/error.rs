//! ABOUTME: Error types for facetstore
//! ABOUTME: One variant per user-visible failure kind, plus `FacetResult`

use thiserror::Error;

/// Every failure a `Store` operation can surface.
///
/// Variants are named after the kinds a caller needs to branch on, not
/// after the internal code path that produced them.
#[derive(Debug, Error)]
pub enum FacetError {
    /// Raised only from `DimensionConfig::validate` / `Store::open`.
    #[error("invalid store configuration: {message}")]
    ConfigInvalid { message: String },

    /// Write-time validation failure for an enumerated dimension.
    #[error("invalid value for dimension `{dimension}`: {message}")]
    InvalidDimensionValue { dimension: String, message: String },

    /// An update/add mentioned a name that is neither a dimension, a
    /// hierarchical reference field, nor a `_data.*` key.
    #[error("unknown dimension `{0}`")]
    UnknownDimension(String),

    /// The operation's target UUID does not exist after preprocessing.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Non-cascade delete attempted on a document with dependents.
    #[error("document {0} has children; delete with cascade=true")]
    HasChildren(String),

    /// `resolve_uuid` given a malformed or unknown Smart ID.
    #[error("invalid or unknown smart id: {0}")]
    InvalidId(String),

    /// The cross-process file lock could not be acquired within the
    /// retry window.
    #[error("timed out acquiring file lock after {attempts} attempts")]
    LockTimeout { attempts: u32 },

    /// I/O or JSON (de)serialization failure. Non-recoverable within the
    /// call that surfaced it.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Internal: the command preprocessor could not resolve a Smart ID.
    /// Never returned from a public method directly — callers that need
    /// the reference to exist convert this into `NotFound`; callers that
    /// tolerate forward references discard it and keep the original
    /// string.
    #[error("could not resolve smart id `{0}`")]
    IdResolution(String),
}

/// Wraps the two concrete persistence failure sources so `FacetError`
/// doesn't need a blanket `#[from]` for either.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used by every public `facetstore` function.
pub type FacetResult<T> = Result<T, FacetError>;

impl From<std::io::Error> for FacetError {
    fn from(err: std::io::Error) -> Self {
        FacetError::Persistence(PersistenceError::Io(err))
    }
}

impl From<serde_json::Error> for FacetError {
    fn from(err: serde_json::Error) -> Self {
        FacetError::Persistence(PersistenceError::Json(err))
    }
}
