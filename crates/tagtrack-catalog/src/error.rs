//! Error types for catalog loading.

use thiserror::Error;

/// Errors that can occur while loading a tag catalog.
///
/// Any error aborts the whole load; a catalog is never partially built.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// I/O error reading the tag file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A data line does not have the expected number of fields.
    #[error("line {line}: expected {expected} values, found {actual}")]
    FieldCount {
        /// 1-based line number.
        line: usize,
        /// Expected number of fields.
        expected: usize,
        /// Number of fields found.
        actual: usize,
    },

    /// A numeric field could not be parsed.
    #[error("line {line}: unable to convert {field} value '{value}' to an unsigned integer")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// Tag id is 0 or 1.
    #[error("line {line}: tag id {value} must be greater than 1")]
    IdNotGreaterThanOne {
        /// 1-based line number.
        line: usize,
        /// Offending id.
        value: i64,
    },

    /// Tag id is odd.
    #[error("line {line}: tag id {value} must be an even number")]
    IdNotEven {
        /// 1-based line number.
        line: usize,
        /// Offending id.
        value: i64,
    },

    /// A field that must be nonzero is zero.
    #[error("line {line}: {field} cannot be 0")]
    ZeroValue {
        /// 1-based line number.
        line: usize,
        /// Field name.
        field: &'static str,
    },

    /// Two lines define the same tag id.
    #[error("line {line}: tag id {id} is already defined")]
    DuplicateId {
        /// 1-based line number.
        line: usize,
        /// Duplicated id.
        id: u32,
    },

    /// The catalog cannot be tuned to a single receiver frequency.
    #[error("unable to tune receiver: exactly one tag is supported, catalog has {count}")]
    Tuning {
        /// Number of tags in the catalog.
        count: usize,
    },

    /// Catalog settings are out of range.
    #[error("invalid catalog setting {field}: {reason}")]
    InvalidSetting {
        /// Setting name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl CatalogError {
    /// Line number the error refers to, if it is a line-level error.
    pub fn line(&self) -> Option<usize> {
        match self {
            CatalogError::FieldCount { line, .. }
            | CatalogError::InvalidNumber { line, .. }
            | CatalogError::IdNotGreaterThanOne { line, .. }
            | CatalogError::IdNotEven { line, .. }
            | CatalogError::ZeroValue { line, .. }
            | CatalogError::DuplicateId { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
