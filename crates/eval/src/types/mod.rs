//! Runtime values, predicate configuration and error types for the
//! tollgate evaluator.
//!
//! Values come from the per-request variable map or from selectors applied
//! to context objects. Predicates come from the assertion configuration.

pub mod data_type;
pub mod message;
pub mod predicate;
pub mod values;

pub use data_type::DataType;
pub use message::{Message, PartInfo, TcpInfo};
pub use predicate::{
    ComparisonAssertion, CustomTest, EvaluatorKind, MultivaluedComparison, Operator, Predicate,
};
pub use values::{format_iso_millis, parse_json_value, Value, ValueKind};

use tollgate_core::SyntaxError;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Caller-visible resolution failures.
///
/// Lenient resolution never produces the first three; it audits them and
/// carries on with an absent value instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no such variable: {name}")]
    NoSuchVariable { name: String },

    #[error("unsupported variable: {name} in {context}")]
    SelectorMiss { name: String, context: String },

    #[error("variable '{name}' is a {kind} and has no meaningful text form")]
    SuspiciousToString { name: String, kind: ValueKind },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

/// Errors surfaced by a comparison evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The predicate list is malformed; the assertion can never run.
    #[error("invalid policy state: {message}")]
    InvalidPolicyState { message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl PolicyError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PolicyError::InvalidPolicyState {
            message: message.into(),
        }
    }
}

/// A variable file or assertion file could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DecodeError {
    pub message: String,
}
