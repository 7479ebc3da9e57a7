//! Coercion target descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValueKind;

/// A named coercion target. A `TypeDeclaration` predicate converts the
/// working value to one of these before any later comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Message,
    Unknown,
}

impl DataType {
    /// Name used in audit messages.
    pub fn display_name(self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Integer => "Integer",
            DataType::Decimal => "Decimal",
            DataType::Boolean => "Boolean",
            DataType::DateTime => "Date/Time",
            DataType::Message => "Message",
            DataType::Unknown => "Unknown",
        }
    }

    /// Whether a value of `kind` already satisfies this type.
    pub fn accepts(self, kind: ValueKind) -> bool {
        match self {
            DataType::String => kind == ValueKind::Text,
            DataType::Integer => kind == ValueKind::Int,
            DataType::Decimal => kind == ValueKind::Decimal,
            DataType::Boolean => kind == ValueKind::Bool,
            DataType::DateTime => kind == ValueKind::DateTime,
            DataType::Message => kind == ValueKind::Message,
            DataType::Unknown => true,
        }
    }

    /// The type whose native representation is `kind`.
    ///
    /// Used when a right-hand value is converted to match a left-hand value.
    pub fn for_kind(kind: ValueKind) -> DataType {
        match kind {
            ValueKind::Text => DataType::String,
            ValueKind::Int => DataType::Integer,
            ValueKind::Decimal => DataType::Decimal,
            ValueKind::Bool => DataType::Boolean,
            ValueKind::DateTime => DataType::DateTime,
            ValueKind::Message => DataType::Message,
            ValueKind::List | ValueKind::Record | ValueKind::Part => DataType::Unknown,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
