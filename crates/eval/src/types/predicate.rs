//! Predicate configuration: what a comparison assertion tests, in order.
//!
//! These are plain data. They deserialize from the JSON assertion form used
//! by the CLI and are validated once by the orchestrator before any value
//! is looked at.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DataType;

// ──────────────────────────────────────────────
// Operators and modes
// ──────────────────────────────────────────────

/// Comparison operators. `EMPTY`, `TRUE` and `FALSE` are unary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Empty,
    True,
    False,
}

impl Operator {
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Empty | Operator::True | Operator::False)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Lt => "LT",
            Operator::Le => "LE",
            Operator::Gt => "GT",
            Operator::Ge => "GE",
            Operator::Contains => "CONTAINS",
            Operator::Empty => "EMPTY",
            Operator::True => "TRUE",
            Operator::False => "FALSE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a multi-valued left operand is reduced for each predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultivaluedComparison {
    #[default]
    All,
    Any,
    First,
    Last,
}

impl MultivaluedComparison {
    /// `ANY` succeeds when at least one element does.
    pub fn is_at_least_one(self) -> bool {
        self == MultivaluedComparison::Any
    }
}

impl fmt::Display for MultivaluedComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MultivaluedComparison::All => "ALL",
            MultivaluedComparison::Any => "ANY",
            MultivaluedComparison::First => "FIRST",
            MultivaluedComparison::Last => "LAST",
        })
    }
}

// ──────────────────────────────────────────────
// Custom tests
// ──────────────────────────────────────────────

/// Whether an evaluator tests one value or a whole sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    SingleValued,
    MultiValued,
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluatorKind::SingleValued => "single-valued",
            EvaluatorKind::MultiValued => "multi-valued",
        })
    }
}

/// A predicate whose test is delegated to an evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomTest {
    /// Character count of the text form within `min..=max`.
    StringLength {
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },
    /// The text form matches a regular expression somewhere.
    Regex { pattern: String },
    /// Number of values within `min..=max`.
    Cardinality {
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },
    /// An evaluator registered on the engine under `evaluator`.
    Named {
        evaluator: String,
        kind: EvaluatorKind,
    },
}

impl CustomTest {
    pub fn kind(&self) -> EvaluatorKind {
        match self {
            CustomTest::StringLength { .. } | CustomTest::Regex { .. } => {
                EvaluatorKind::SingleValued
            }
            CustomTest::Cardinality { .. } => EvaluatorKind::MultiValued,
            CustomTest::Named { kind, .. } => *kind,
        }
    }
}

fn fmt_bounds(f: &mut fmt::Formatter<'_>, min: usize, max: Option<usize>) -> fmt::Result {
    match max {
        Some(max) => write!(f, "{}..{}", min, max),
        None => write!(f, "{}..", min),
    }
}

impl fmt::Display for CustomTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomTest::StringLength { min, max } => {
                f.write_str("string length ")?;
                fmt_bounds(f, *min, *max)
            }
            CustomTest::Regex { pattern } => write!(f, "matches /{}/", pattern),
            CustomTest::Cardinality { min, max } => {
                f.write_str("cardinality ")?;
                fmt_bounds(f, *min, *max)
            }
            CustomTest::Named { evaluator, kind } => write!(f, "{} evaluator '{}'", kind, evaluator),
        }
    }
}

// ──────────────────────────────────────────────
// Predicates
// ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// One configured test step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Converts the working value; has no boolean result of its own.
    #[serde(rename = "data_type")]
    TypeDeclaration {
        #[serde(rename = "type")]
        data_type: DataType,
    },
    /// `left <operator> right_value`. `right_value` is a template.
    Binary {
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right_value: Option<String>,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        negated: bool,
    },
    Custom {
        test: CustomTest,
        #[serde(default)]
        negated: bool,
    },
}

impl Predicate {
    pub fn data_type(data_type: DataType) -> Self {
        Predicate::TypeDeclaration { data_type }
    }

    pub fn binary(operator: Operator, right_value: impl Into<String>) -> Self {
        Predicate::Binary {
            operator,
            right_value: Some(right_value.into()),
            case_sensitive: true,
            negated: false,
        }
    }

    pub fn unary(operator: Operator) -> Self {
        Predicate::Binary {
            operator,
            right_value: None,
            case_sensitive: true,
            negated: false,
        }
    }

    pub fn custom(test: CustomTest) -> Self {
        Predicate::Custom {
            test,
            negated: false,
        }
    }

    /// The same predicate with its boolean result inverted.
    /// A type declaration is returned unchanged.
    pub fn negate(mut self) -> Self {
        match &mut self {
            Predicate::Binary { negated, .. } | Predicate::Custom { negated, .. } => {
                *negated = !*negated
            }
            Predicate::TypeDeclaration { .. } => {}
        }
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        if let Predicate::Binary { case_sensitive, .. } = &mut self {
            *case_sensitive = false;
        }
        self
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Predicate::Binary { negated, .. } | Predicate::Custom { negated, .. } => *negated,
            Predicate::TypeDeclaration { .. } => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::TypeDeclaration { data_type } => write!(f, "is a {}", data_type),
            Predicate::Binary {
                operator,
                right_value,
                case_sensitive,
                negated,
            } => {
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "{}", operator)?;
                if let Some(rv) = right_value.as_ref().filter(|_| !operator.is_unary()) {
                    write!(f, " '{}'", rv)?;
                }
                if !case_sensitive && !operator.is_unary() {
                    f.write_str(" (case insensitive)")?;
                }
                Ok(())
            }
            Predicate::Custom { test, negated } => {
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "{}", test)
            }
        }
    }
}

/// A complete comparison assertion in its JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonAssertion {
    /// Left-hand template, usually a single `${...}` reference.
    pub expression: String,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub multivalued: MultivaluedComparison,
    #[serde(default = "default_true")]
    pub fail_if_variable_not_found: bool,
}

impl ComparisonAssertion {
    pub fn new(expression: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        ComparisonAssertion {
            expression: expression.into(),
            predicates,
            multivalued: MultivaluedComparison::default(),
            fail_if_variable_not_found: true,
        }
    }

    pub fn with_mode(mut self, mode: MultivaluedComparison) -> Self {
        self.multivalued = mode;
        self
    }

    pub fn allow_missing(mut self) -> Self {
        self.fail_if_variable_not_found = false;
        self
    }
}
