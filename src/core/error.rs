use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::FormatId;

/// A single data-quality issue found by the extraction validator.
///
/// Issues are result values, not errors: the validator reports them and the
/// caller decides between retry, manual review, and rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dot-separated path to the offending field (e.g. "lines[2].total_price").
    pub field: String,
    /// Human-readable description.
    pub message: String,
    /// Expected amount, when the issue is a numeric mismatch.
    pub expected: Option<Decimal>,
    /// Stated amount, when the issue is a numeric mismatch.
    pub actual: Option<Decimal>,
}

impl ValidationIssue {
    /// An issue without amounts (missing field, structural problem).
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// A numeric mismatch carrying the expected and stated amounts.
    pub fn mismatch(
        field: impl Into<String>,
        message: impl Into<String>,
        expected: Decimal,
        actual: Decimal,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.expected, self.actual) {
            (Some(e), Some(a)) => {
                write!(f, "{}: {} (expected {}, got {})", self.field, self.message, e, a)
            }
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// A format identifier the generator registry does not recognize.
///
/// This is a programmer/configuration error, not a user-facing condition.
#[derive(Debug, Clone, Error)]
#[error("unknown output format '{id}'")]
pub struct UnknownFormatError {
    /// The rejected identifier.
    pub id: String,
}

/// Errors raised by format generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// The canonical model lacks a field the target schema mandates.
    /// Generators fail fast on this — a non-compliant document is never
    /// silently produced.
    #[error("{format}: mandatory field '{field}' is missing from the invoice")]
    MissingField {
        format: FormatId,
        field: &'static str,
    },

    /// XML serialization failure.
    #[error("XML error: {0}")]
    Xml(String),

    /// PDF container construction failure (Factur-X family).
    #[error("PDF error: {0}")]
    Pdf(String),
}

/// Errors raised on the extraction path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The provider call itself failed (network, auth, quota).
    #[error("provider call failed: {0}")]
    Provider(String),

    /// The provider responded but the payload is unusable.
    #[error("provider returned unusable data: {0}")]
    Unusable(String),

    /// The requested strategy is not implemented by this provider.
    /// Callers select strategies via capability flags, so hitting this
    /// indicates a wiring bug rather than a runtime condition.
    #[error("extraction strategy '{0}' not supported by this provider")]
    Unsupported(&'static str),

    /// The corrective-retry loop ran out of attempts; carries the final
    /// validation issue list verbatim for manual review.
    #[error("extraction failed validation after {attempts} attempt(s)")]
    RetriesExhausted {
        attempts: u32,
        issues: Vec<ValidationIssue>,
    },

    /// The rate limiter was shut down while the job was queued.
    #[error("extraction aborted: rate limiter shut down")]
    Shutdown,
}
