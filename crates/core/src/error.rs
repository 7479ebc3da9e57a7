use serde::Serialize;

/// A malformed variable reference.
///
/// Only problems inside an otherwise well-delimited `${...}` are errors;
/// unbalanced delimiters are passed through as literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum SyntaxError {
    /// The subscript is not a non-negative integer (`${foo[abc]}`).
    #[error("non-numeric subscript '{subscript}' in variable '{name}'")]
    NonNumericSubscript { name: String, subscript: String },

    /// The subscript is negative (`${foo[-1]}`).
    #[error("negative subscript '{subscript}' in variable '{name}'")]
    NegativeSubscript { name: String, subscript: String },

    /// A range subscript whose start lies after its end (`${foo[3-1]}`).
    #[error("inverted range [{start}-{end}] in variable '{name}'")]
    InvertedRange {
        name: String,
        start: usize,
        end: usize,
    },
}
