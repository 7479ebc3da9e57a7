//! Custom test evaluators.
//!
//! A custom predicate is compiled into an [`Evaluator`] before the predicate
//! loop starts, so a bad regex or an unknown evaluator name is a policy error
//! rather than a data-driven `false`.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{CustomTest, EvaluatorKind, PolicyError, Value};

/// Tests one value.
pub trait SingleValuedEvaluator: Send + Sync {
    fn evaluate(&self, value: &Value) -> bool;
}

/// Tests a whole sequence at once.
pub trait MultiValuedEvaluator: Send + Sync {
    fn evaluate(&self, values: &[Value]) -> bool;
}

/// A ready-to-run evaluator of either kind.
#[derive(Clone)]
pub enum Evaluator {
    Single(Arc<dyn SingleValuedEvaluator>),
    Multi(Arc<dyn MultiValuedEvaluator>),
}

impl Evaluator {
    pub fn kind(&self) -> EvaluatorKind {
        match self {
            Evaluator::Single(_) => EvaluatorKind::SingleValued,
            Evaluator::Multi(_) => EvaluatorKind::MultiValued,
        }
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Evaluator({})", self.kind())
    }
}

// ──────────────────────────────────────────────
// Built-in evaluators
// ──────────────────────────────────────────────

/// Character count of the text form within bounds.
#[derive(Debug, Clone, Copy)]
pub struct StringLengthEvaluator {
    pub min: usize,
    pub max: Option<usize>,
}

impl SingleValuedEvaluator for StringLengthEvaluator {
    fn evaluate(&self, value: &Value) -> bool {
        within(value.to_text().chars().count(), self.min, self.max)
    }
}

#[derive(Debug, Clone)]
pub struct RegexEvaluator {
    regex: Regex,
}

impl RegexEvaluator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(RegexEvaluator {
            regex: Regex::new(pattern)?,
        })
    }
}

impl SingleValuedEvaluator for RegexEvaluator {
    fn evaluate(&self, value: &Value) -> bool {
        self.regex.is_match(&value.to_text())
    }
}

/// Number of values within bounds.
#[derive(Debug, Clone, Copy)]
pub struct CardinalityEvaluator {
    pub min: usize,
    pub max: Option<usize>,
}

impl MultiValuedEvaluator for CardinalityEvaluator {
    fn evaluate(&self, values: &[Value]) -> bool {
        within(values.len(), self.min, self.max)
    }
}

fn within(n: usize, min: usize, max: Option<usize>) -> bool {
    n >= min && max.map_or(true, |max| n <= max)
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Named external evaluators, registered once on the engine builder.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorRegistry {
    named: HashMap<String, Evaluator>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_single(
        &mut self,
        name: impl Into<String>,
        evaluator: impl SingleValuedEvaluator + 'static,
    ) {
        self.named
            .insert(name.into(), Evaluator::Single(Arc::new(evaluator)));
    }

    pub fn register_multi(
        &mut self,
        name: impl Into<String>,
        evaluator: impl MultiValuedEvaluator + 'static,
    ) {
        self.named
            .insert(name.into(), Evaluator::Multi(Arc::new(evaluator)));
    }

    pub fn get(&self, name: &str) -> Option<&Evaluator> {
        self.named.get(name)
    }

    /// Turn a configured custom test into something that can run.
    pub fn compile(&self, test: &CustomTest) -> Result<Evaluator, PolicyError> {
        match test {
            CustomTest::StringLength { min, max } => {
                check_bounds("string length", *min, *max)?;
                Ok(Evaluator::Single(Arc::new(StringLengthEvaluator {
                    min: *min,
                    max: *max,
                })))
            }
            CustomTest::Regex { pattern } => {
                let evaluator = RegexEvaluator::new(pattern).map_err(|e| {
                    PolicyError::invalid(format!("invalid regex '{}': {}", pattern, e))
                })?;
                Ok(Evaluator::Single(Arc::new(evaluator)))
            }
            CustomTest::Cardinality { min, max } => {
                check_bounds("cardinality", *min, *max)?;
                Ok(Evaluator::Multi(Arc::new(CardinalityEvaluator {
                    min: *min,
                    max: *max,
                })))
            }
            CustomTest::Named { evaluator, kind } => {
                let found = self.get(evaluator).ok_or_else(|| {
                    PolicyError::invalid(format!("no evaluator registered as '{}'", evaluator))
                })?;
                if found.kind() != *kind {
                    return Err(PolicyError::invalid(format!(
                        "evaluator '{}' is {} but the predicate requires {}",
                        evaluator,
                        found.kind(),
                        kind
                    )));
                }
                Ok(found.clone())
            }
        }
    }
}

fn check_bounds(what: &str, min: usize, max: Option<usize>) -> Result<(), PolicyError> {
    match max {
        Some(max) if max < min => Err(PolicyError::invalid(format!(
            "{} maximum {} is below minimum {}",
            what, max, min
        ))),
        _ => Ok(()),
    }
}
