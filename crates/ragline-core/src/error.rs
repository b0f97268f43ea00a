//! Error kinds shared by every ragline component.
//!
//! Provider and store failures are converted into a [`RagError`] at their
//! boundary so callers (orchestrators, the HTTP layer, tests) can match on
//! the cause instead of receiving an opaque sentinel.

use thiserror::Error;

/// Main error type for ragline operations.
#[derive(Error, Debug)]
pub enum RagError {
    /// A provider was used before a model was selected, or a backend was
    /// configured in a way it cannot support.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An embedding or generation call failed or returned empty content.
    #[error("provider error: {0}")]
    Provider(String),

    /// Unknown collection, project, or asset.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: project identifier, chunking parameters, request shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// A vector's length differs from the collection's configured size.
    #[error("dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A multi-step write aborted after `inserted` records were already stored.
    #[error("partial failure after {inserted} records: {cause}")]
    PartialFailure {
        inserted: usize,
        cause: Box<RagError>,
    },

    /// The backend identifier does not name a known provider.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A template group, key, or substitution variable is undefined.
    #[error("template lookup failed: {0}")]
    Lookup(String),

    /// The document store or vector database failed.
    #[error("store error: {0}")]
    Store(String),
}

impl RagError {
    /// Records successfully written before the failure, if this is a
    /// [`RagError::PartialFailure`].
    pub fn inserted(&self) -> Option<usize> {
        match self {
            RagError::PartialFailure { inserted, .. } => Some(*inserted),
            _ => None,
        }
    }

    /// Short machine-readable code, used in logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration",
            RagError::Provider(_) => "provider_error",
            RagError::NotFound(_) => "not_found",
            RagError::Validation(_) => "bad_request",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::PartialFailure { .. } => "partial_failure",
            RagError::UnknownProvider(_) => "unknown_provider",
            RagError::Lookup(_) => "template_lookup",
            RagError::Store(_) => "store_error",
        }
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Store(format!("serialization: {}", err))
    }
}

/// Result type alias for ragline operations.
pub type Result<T> = std::result::Result<T, RagError>;
