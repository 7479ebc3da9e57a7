//! Placeholder syntax shared by every tollgate component that reads
//! `${...}` variable references out of configured text.

pub mod error;
pub mod syntax;

pub use error::SyntaxError;
pub use syntax::{
    is_any_variable_referenced, parse, referenced_names, single_reference, Filter, Segment,
    Segments, VariableReference, DEFAULT_MV_DELIMITER, SYNTAX_PREFIX, SYNTAX_SUFFIX,
};
