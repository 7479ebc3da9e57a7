//! Comparison orchestrator: resolve the left value, run the predicates in
//! order, report the verdict and the first predicate that failed.

use serde::Serialize;
use tracing::debug;

use crate::audit::AuditEvent;
use crate::engine::{Engine, Session};
use crate::evaluator::Evaluator;
use crate::resolve::{collapse, VariableMap};
use crate::state::{EvaluationState, StepContext};
use crate::types::{
    ComparisonAssertion, MultivaluedComparison, PolicyError, Predicate, ResolveError, Value,
};

/// Result of one comparison evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonOutcome {
    pub verdict: bool,
    /// Diagnostic only; `None` when the verdict is `true` or no predicate ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<Predicate>,
}

impl ComparisonOutcome {
    fn falsified(first_failure: Option<Predicate>) -> Self {
        ComparisonOutcome {
            verdict: false,
            first_failure,
        }
    }
}

/// An assertion whose predicate list has been checked and whose custom
/// tests are built, ready to run any number of times from any thread.
#[derive(Debug, Clone)]
pub struct CompiledAssertion {
    assertion: ComparisonAssertion,
    evaluators: Vec<Option<Evaluator>>,
}

impl CompiledAssertion {
    pub fn assertion(&self) -> &ComparisonAssertion {
        &self.assertion
    }
}

impl Engine {
    /// Validate `assertion` and compile its custom tests once.
    pub fn compile(
        &self,
        assertion: &ComparisonAssertion,
    ) -> Result<CompiledAssertion, PolicyError> {
        Ok(CompiledAssertion {
            evaluators: self.compile_predicates(&assertion.predicates)?,
            assertion: assertion.clone(),
        })
    }

    /// Check the predicate list's shape and compile its custom tests.
    fn compile_predicates(
        &self,
        predicates: &[Predicate],
    ) -> Result<Vec<Option<Evaluator>>, PolicyError> {
        let mut declared = None;
        let mut compiled = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let evaluator = match predicate {
                Predicate::TypeDeclaration { data_type } => {
                    if let Some(first) = declared.replace(*data_type) {
                        return Err(PolicyError::invalid(format!(
                            "only one data type may be declared (found {} and {})",
                            first, data_type
                        )));
                    }
                    None
                }
                Predicate::Binary {
                    operator,
                    right_value,
                    ..
                } => {
                    if !operator.is_unary() && right_value.is_none() {
                        return Err(PolicyError::invalid(format!(
                            "operator {} requires a right-hand value",
                            operator
                        )));
                    }
                    None
                }
                Predicate::Custom { test, .. } => Some(self.evaluators().compile(test)?),
            };
            compiled.push(evaluator);
        }
        Ok(compiled)
    }
}

impl<'a> Session<'a> {
    /// Evaluate `predicates` against `left_expression`.
    ///
    /// The left value must resolve; an absent value is a `false` verdict
    /// before any predicate runs.
    pub fn evaluate(
        &self,
        left_expression: &str,
        predicates: &[Predicate],
        mode: MultivaluedComparison,
        vars: &VariableMap,
    ) -> Result<ComparisonOutcome, PolicyError> {
        let evaluators = self.engine.compile_predicates(predicates)?;
        self.run(left_expression, predicates, &evaluators, mode, true, vars)
    }

    /// Evaluate a complete assertion, honouring its missing-variable policy.
    pub fn evaluate_assertion(
        &self,
        assertion: &ComparisonAssertion,
        vars: &VariableMap,
    ) -> Result<ComparisonOutcome, PolicyError> {
        let evaluators = self.engine.compile_predicates(&assertion.predicates)?;
        self.run_assertion(assertion, &evaluators, vars)
    }

    /// Run an assertion compiled by [`Engine::compile`].
    pub fn evaluate_compiled(
        &self,
        compiled: &CompiledAssertion,
        vars: &VariableMap,
    ) -> Result<ComparisonOutcome, PolicyError> {
        self.run_assertion(&compiled.assertion, &compiled.evaluators, vars)
    }

    fn run_assertion(
        &self,
        assertion: &ComparisonAssertion,
        evaluators: &[Option<Evaluator>],
        vars: &VariableMap,
    ) -> Result<ComparisonOutcome, PolicyError> {
        self.run(
            &assertion.expression,
            &assertion.predicates,
            evaluators,
            assertion.multivalued,
            assertion.fail_if_variable_not_found,
            vars,
        )
    }

    fn run(
        &self,
        left_expression: &str,
        predicates: &[Predicate],
        evaluators: &[Option<Evaluator>],
        mode: MultivaluedComparison,
        require_value: bool,
        vars: &VariableMap,
    ) -> Result<ComparisonOutcome, PolicyError> {
        let Some(left) = self.resolve_left(left_expression, require_value, vars)? else {
            self.audit.record(&AuditEvent::ComparisonNull);
            return Ok(ComparisonOutcome::falsified(None));
        };

        let mut state = EvaluationState::new(left, mode);
        debug!(
            expression = left_expression,
            multivalued = state.is_multivalued(),
            %mode,
            predicates = predicates.len(),
            "evaluating comparison"
        );

        let cx = StepContext {
            converter: self.engine.converter(),
            resolver: self.resolver(),
            vars,
        };
        for (predicate, evaluator) in predicates.iter().zip(evaluators) {
            state.evaluate(predicate, evaluator.as_ref(), &cx)?;
            if !state.verdict {
                self.audit.record(&AuditEvent::ComparisonNot {
                    predicate: predicate.to_string(),
                });
                return Ok(ComparisonOutcome::falsified(Some(predicate.clone())));
            }
        }

        self.audit.record(&AuditEvent::ComparisonOk);
        Ok(ComparisonOutcome {
            verdict: true,
            first_failure: None,
        })
    }

    /// `None` means there is nothing to compare.
    fn resolve_left(
        &self,
        expression: &str,
        require_value: bool,
        vars: &VariableMap,
    ) -> Result<Option<Value>, PolicyError> {
        let resolver = self.resolver();
        if !require_value {
            return Ok(Some(Value::Text(resolver.expand(expression, vars, false)?)));
        }
        let reference = tollgate_core::single_reference(expression).map_err(ResolveError::from)?;
        let resolved = match reference {
            Some(reference) => resolver
                .resolve_reference(&reference, vars, true)
                .map(collapse),
            None => resolver.expand(expression, vars, true).map(|s| Some(Value::Text(s))),
        };
        match resolved {
            Ok(value) => Ok(value),
            Err(ResolveError::Syntax(e)) => Err(PolicyError::Resolve(ResolveError::Syntax(e))),
            Err(_) => Ok(None),
        }
    }
}
