//! Errors surfaced while converting a Substrait plan.

use thiserror::Error;

/// Why a plan could not be converted.
///
/// Pushdown ineligibility is never an error; unsupported filter leaves
/// simply stay above the scan as residuals. These variants cover the fatal
/// cases only.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The plan violates a structural requirement (missing children, empty
    /// file lists, malformed stream references).
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The plan uses a construct the converter does not handle.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A function anchor has no entry in the plan's extension declarations.
    #[error("no function registered for anchor {0}")]
    UnknownFunction(u32),

    /// An expression kind that cannot be translated.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),
}
