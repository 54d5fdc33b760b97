//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failure of a domain rule.
///
/// Storage, scheduling and configuration failures have their own error types in
/// the crates that own those concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A record failed its invariants (empty SKU, zero quantity, missing product).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A bounded value fell outside its range.
    #[error("{field} out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn out_of_range(field: &'static str, detail: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            detail: detail.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for failures caused by the record itself rather than how it was addressed.
    pub fn is_invalid_record(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::OutOfRange { .. })
    }
}
