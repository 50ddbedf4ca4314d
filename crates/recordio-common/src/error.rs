//! Error types for RecordIO
//!
//! This module defines the common error taxonomy used throughout the
//! system. Errors fall into five broad kinds (validation, not-found,
//! forbidden, conflict, internal); a failed compensation action can be
//! attached to its triggering error without losing the primary cause.

use thiserror::Error;

/// Common result type for RecordIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an error, used for status mapping and for
/// deciding whether a request can be retried unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; the request must change before retrying
    Validation,
    /// Referenced record, version, or parent does not exist
    NotFound,
    /// ACL or policy denial
    Forbidden,
    /// Optimistic-lock version mismatch or already-exists conflict
    Conflict,
    /// Store or provider failure not attributable to caller input
    Internal,
}

/// Common error type for RecordIO
#[derive(Debug, Error)]
pub enum Error {
    // Validation errors
    #[error("invalid kind: '{0}' does not follow the required naming convention")]
    InvalidKind(String),

    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("invalid ACL: {0}")]
    InvalidAcl(String),

    #[error("invalid legal tags: {0}")]
    InvalidLegalTag(String),

    #[error("invalid other relevant data countries: the country code '{0}' is invalid")]
    InvalidDataCountry(String),

    #[error("invalid patch operation: {0}")]
    InvalidPatchOperation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Not-found errors
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("record version {version} for record '{id}' was not found")]
    RecordVersionNotFound { id: String, version: u64 },

    // Authorization errors
    #[error("access denied: {0}")]
    Forbidden(String),

    // Concurrency errors
    #[error("version conflict: {0}")]
    Conflict(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A primary error with a secondary (compensation) failure attached.
    /// Status mapping and kind classification follow the primary error.
    #[error("{primary}")]
    WithSuppressed {
        primary: Box<Error>,
        suppressed: Box<Error>,
    },
}

impl Error {
    /// Create a validation error for an arbitrary request problem
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Attach a secondary error (e.g. a failed compensation) to this one.
    /// The receiver remains the primary cause.
    #[must_use]
    pub fn with_suppressed(self, suppressed: Error) -> Self {
        Self::WithSuppressed {
            primary: Box::new(self),
            suppressed: Box::new(suppressed),
        }
    }

    /// The attached compensation error, if any
    #[must_use]
    pub fn suppressed(&self) -> Option<&Error> {
        match self {
            Self::WithSuppressed { suppressed, .. } => Some(suppressed),
            _ => None,
        }
    }

    /// Broad classification of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKind(_)
            | Self::InvalidRecordId(_)
            | Self::InvalidAcl(_)
            | Self::InvalidLegalTag(_)
            | Self::InvalidDataCountry(_)
            | Self::InvalidPatchOperation(_)
            | Self::InvalidRequest(_) => ErrorKind::Validation,

            Self::RecordNotFound(_) | Self::RecordVersionNotFound { .. } => ErrorKind::NotFound,

            Self::Forbidden(_) => ErrorKind::Forbidden,

            Self::Conflict(_) => ErrorKind::Conflict,

            Self::Internal(_) | Self::Serialization(_) => ErrorKind::Internal,

            Self::WithSuppressed { primary, .. } => primary.kind(),
        }
    }

    /// Check if this is a not-found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get the HTTP status code the outer API layer should map this to
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}
