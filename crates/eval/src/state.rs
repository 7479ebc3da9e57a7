//! Predicate evaluation state machine.
//!
//! One [`EvaluationState`] exists per comparison evaluation. It holds the
//! left value(s), the declared type once a type declaration has run, and
//! the running verdict. Each predicate kind is handled by one function that
//! takes the state by reference; nothing here outlives a single evaluation.
//!
//! Data-driven failures never return `Err`. They are audited and fold into
//! `false` for the element, predicate or evaluation they occur in.

use std::borrow::Cow;
use std::ops::Range;

use crate::audit::AuditEvent;
use crate::coerce::Converter;
use crate::evaluator::Evaluator;
use crate::operator::{evaluate_binary, evaluate_unary};
use crate::resolve::{Resolver, VariableMap};
use crate::types::{DataType, MultivaluedComparison, Operator, PolicyError, Predicate, Value};

/// The left operand, shaped once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Scalar(Value),
    Sequence(Vec<Value>),
}

/// Transient per-evaluation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationState {
    pub value: StateValue,
    pub mode: MultivaluedComparison,
    pub declared_type: Option<DataType>,
    pub verdict: bool,
}

/// Read-only collaborators shared by every predicate step.
pub(crate) struct StepContext<'a> {
    pub converter: &'a dyn Converter,
    pub resolver: Resolver<'a>,
    pub vars: &'a VariableMap,
}

impl EvaluationState {
    /// A list becomes a sequence, anything else a scalar.
    pub fn new(left: Value, mode: MultivaluedComparison) -> Self {
        let value = match left {
            Value::List(items) => StateValue::Sequence(items),
            other => StateValue::Scalar(other),
        };
        EvaluationState {
            value,
            mode,
            declared_type: None,
            verdict: true,
        }
    }

    pub fn is_multivalued(&self) -> bool {
        matches!(self.value, StateValue::Sequence(_))
    }

    fn selects_nothing(&self) -> bool {
        match &self.value {
            StateValue::Sequence(values) => {
                values.is_empty()
                    && matches!(
                        self.mode,
                        MultivaluedComparison::First | MultivaluedComparison::Last
                    )
            }
            StateValue::Scalar(_) => false,
        }
    }

    /// Apply one predicate. `evaluator` is the compiled form of a custom test.
    pub(crate) fn evaluate(
        &mut self,
        predicate: &Predicate,
        evaluator: Option<&Evaluator>,
        cx: &StepContext<'_>,
    ) -> Result<(), PolicyError> {
        let result = match predicate {
            Predicate::TypeDeclaration { data_type } => {
                return self.declare_type(*data_type, cx);
            }
            // FIRST or LAST of nothing: false whatever the predicate or its negation
            _ if self.selects_nothing() => false,
            Predicate::Binary {
                operator,
                right_value,
                case_sensitive,
                negated,
            } => {
                let raw = self.binary(
                    predicate,
                    *operator,
                    right_value.as_deref(),
                    *case_sensitive,
                    cx,
                )?;
                raw != *negated
            }
            Predicate::Custom { test, negated } => {
                let evaluator = evaluator.ok_or_else(|| {
                    PolicyError::invalid(format!("custom test '{}' was not compiled", test))
                })?;
                self.custom(evaluator) != *negated
            }
        };
        self.verdict = self.verdict && result;
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Type declaration
    // ──────────────────────────────────────────────

    fn declare_type(&mut self, target: DataType, cx: &StepContext<'_>) -> Result<(), PolicyError> {
        if let Some(existing) = self.declared_type {
            return Err(PolicyError::invalid(format!(
                "data type declared twice ({} then {})",
                existing, target
            )));
        }
        self.declared_type = Some(target);

        let mode = self.mode;
        match &mut self.value {
            StateValue::Scalar(v) => match convert(cx, v, target) {
                Some(converted) => *v = converted,
                None => self.verdict = false,
            },
            StateValue::Sequence(values) => {
                let range = effective_range(values.len(), mode);
                let mut converted = Vec::with_capacity(range.len());
                let mut failed = false;
                for i in range {
                    match convert(cx, &values[i], target) {
                        Some(c) => converted.push((i, c)),
                        None => {
                            failed = true;
                            if !mode.is_at_least_one() {
                                break;
                            }
                        }
                    }
                }
                let ok = if mode.is_at_least_one() {
                    !converted.is_empty()
                } else {
                    !failed && (mode == MultivaluedComparison::All || !values.is_empty())
                };
                if !ok {
                    self.verdict = false;
                    return Ok(());
                }
                for (i, c) in converted {
                    values[i] = c;
                }
            }
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Binary comparison
    // ──────────────────────────────────────────────

    fn binary(
        &self,
        predicate: &Predicate,
        op: Operator,
        right_expression: Option<&str>,
        case_sensitive: bool,
        cx: &StepContext<'_>,
    ) -> Result<bool, PolicyError> {
        let right = if op.is_unary() {
            None
        } else {
            let expression = right_expression.ok_or_else(|| {
                PolicyError::invalid(format!("operator {} requires a right-hand value", op))
            })?;
            cx.resolver
                .resolve_expression(expression, cx.vars, false)?
        };
        let label = predicate.to_string();
        Ok(self.reduce(|left| {
            self.compare_element(left, op, right.as_ref(), case_sensitive, &label, cx)
        }))
    }

    fn compare_element(
        &self,
        left: &Value,
        op: Operator,
        right: Option<&Value>,
        case_sensitive: bool,
        label: &str,
        cx: &StepContext<'_>,
    ) -> bool {
        let audit = cx.resolver.audit;
        let left = comparable_form(left, "Left", label, cx);
        if op.is_unary() {
            return evaluate_unary(op, &left);
        }

        let converted = right.and_then(|r| match self.declared_type {
            Some(target) => convert(cx, r, target),
            None => convert_like(cx, r, &left),
        });
        let Some(right) = converted else {
            audit.record(&AuditEvent::ComparisonRightIsNull { operator: op });
            return false;
        };
        let right = comparable_form(&right, "Right", label, cx);

        match evaluate_binary(op, &left, &right, case_sensitive) {
            Ok(result) => result,
            Err(nc) => {
                audit.record(&AuditEvent::ComparisonOperatorDefect {
                    operator: op,
                    left: nc.left.to_string(),
                    right: nc.right.to_string(),
                });
                false
            }
        }
    }

    // ──────────────────────────────────────────────
    // Custom tests
    // ──────────────────────────────────────────────

    fn custom(&self, evaluator: &Evaluator) -> bool {
        match (evaluator, &self.value) {
            (Evaluator::Single(e), _) => self.reduce(|v| e.evaluate(v)),
            (Evaluator::Multi(e), StateValue::Scalar(v)) => e.evaluate(std::slice::from_ref(v)),
            (Evaluator::Multi(e), StateValue::Sequence(values)) => e.evaluate(values),
        }
    }

    /// Apply `test` to the scalar, or to the effective elements under the
    /// configured mode. `ANY` visits every element; the others stop at the
    /// first `false`.
    fn reduce(&self, mut test: impl FnMut(&Value) -> bool) -> bool {
        match &self.value {
            StateValue::Scalar(v) => test(v),
            StateValue::Sequence(values) => {
                let range = effective_range(values.len(), self.mode);
                if range.is_empty() {
                    return self.mode == MultivaluedComparison::All;
                }
                if self.mode.is_at_least_one() {
                    let mut any = false;
                    for v in &values[range] {
                        any |= test(v);
                    }
                    any
                } else {
                    values[range].iter().all(test)
                }
            }
        }
    }
}

/// Indices a mode looks at: everything, or just the first or last element.
pub fn effective_range(len: usize, mode: MultivaluedComparison) -> Range<usize> {
    match mode {
        MultivaluedComparison::All | MultivaluedComparison::Any => 0..len,
        MultivaluedComparison::First => 0..len.min(1),
        MultivaluedComparison::Last => len.saturating_sub(1)..len,
    }
}

fn convert(cx: &StepContext<'_>, value: &Value, target: DataType) -> Option<Value> {
    audited_conversion(cx, value, target, || cx.converter.convert(value, target))
}

/// Right-hand values with no declared type take the left element's form.
fn convert_like(cx: &StepContext<'_>, value: &Value, template: &Value) -> Option<Value> {
    let target = DataType::for_kind(template.kind());
    audited_conversion(cx, value, target, || cx.converter.convert_like(value, template))
}

fn audited_conversion(
    cx: &StepContext<'_>,
    value: &Value,
    target: DataType,
    conversion: impl FnOnce() -> Option<Value>,
) -> Option<Value> {
    if target.accepts(value.kind()) {
        return Some(value.clone());
    }
    let audit = cx.resolver.audit;
    audit.record(&AuditEvent::ComparisonConverting {
        from: value.type_name().to_string(),
        to: target.display_name().to_string(),
    });
    let converted = conversion();
    if converted.is_none() {
        audit.record(&AuditEvent::ComparisonCantConvert {
            from: value.type_name().to_string(),
            to: target.display_name().to_string(),
        });
    }
    converted
}

fn comparable_form<'v>(
    value: &'v Value,
    side: &'static str,
    label: &str,
    cx: &StepContext<'_>,
) -> Cow<'v, Value> {
    if value.is_comparable() {
        return Cow::Borrowed(value);
    }
    cx.resolver.audit.record(&AuditEvent::ComparisonNotComparable {
        side,
        predicate: label.to_string(),
    });
    Cow::Owned(Value::Text(value.to_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use crate::coerce::StandardConverter;
    use crate::selector::SelectorRegistry;
    use pretty_assertions::assert_eq;

    struct Fixture {
        selectors: SelectorRegistry,
        audit: MemoryAudit,
        vars: VariableMap,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                selectors: SelectorRegistry::standard(),
                audit: MemoryAudit::new(),
                vars: VariableMap::new().with("limit", 10i64),
            }
        }

        fn cx(&self) -> StepContext<'_> {
            StepContext {
                converter: &StandardConverter,
                resolver: Resolver {
                    selectors: &self.selectors,
                    audit: &self.audit,
                    default_delimiter: ", ",
                },
                vars: &self.vars,
            }
        }
    }

    fn seq(items: &[&str]) -> Value {
        Value::from(items.to_vec())
    }

    #[test]
    fn effective_ranges() {
        use MultivaluedComparison::*;
        assert_eq!(effective_range(3, All), 0..3);
        assert_eq!(effective_range(3, First), 0..1);
        assert_eq!(effective_range(3, Last), 2..3);
        assert!(effective_range(0, First).is_empty());
        assert!(effective_range(0, Last).is_empty());
    }

    #[test]
    fn shape_is_fixed_by_left_value() {
        assert!(EvaluationState::new(seq(&["a"]), MultivaluedComparison::All).is_multivalued());
        assert!(!EvaluationState::new(Value::from("a"), MultivaluedComparison::All).is_multivalued());
    }

    #[test]
    fn scalar_type_declaration_converts_in_place() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("42"), MultivaluedComparison::All);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert_eq!(s.value, StateValue::Scalar(Value::Int(42)));
        assert!(s.verdict);
        assert!(f.audit.contains_code(7104));
    }

    #[test]
    fn scalar_type_declaration_failure_is_false() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("abc"), MultivaluedComparison::All);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert!(!s.verdict);
        assert!(f.audit.contains_code(7105));
    }

    #[test]
    fn second_type_declaration_is_a_policy_error() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("1"), MultivaluedComparison::All);
        let p = Predicate::data_type(DataType::Integer);
        s.evaluate(&p, None, &f.cx()).unwrap();
        assert!(matches!(
            s.evaluate(&p, None, &f.cx()),
            Err(PolicyError::InvalidPolicyState { .. })
        ));
    }

    #[test]
    fn all_mode_conversion_failure_leaves_values_untouched() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(seq(&["1", "x", "3"]), MultivaluedComparison::All);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert!(!s.verdict);
        assert_eq!(
            s.value,
            StateValue::Sequence(vec!["1".into(), "x".into(), "3".into()])
        );
    }

    #[test]
    fn any_mode_conversion_keeps_unconvertible_elements() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(seq(&["1", "x", "3"]), MultivaluedComparison::Any);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
        assert_eq!(
            s.value,
            StateValue::Sequence(vec![Value::Int(1), "x".into(), Value::Int(3)])
        );
    }

    #[test]
    fn any_mode_conversion_fails_when_nothing_converts() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(seq(&["x", "y"]), MultivaluedComparison::Any);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert!(!s.verdict);
    }

    #[test]
    fn last_mode_converts_only_the_last_element() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(seq(&["x", "2"]), MultivaluedComparison::Last);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
        assert_eq!(
            s.value,
            StateValue::Sequence(vec!["x".into(), Value::Int(2)])
        );
    }

    #[test]
    fn right_value_follows_declared_type() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("9"), MultivaluedComparison::All);
        s.evaluate(&Predicate::data_type(DataType::Integer), None, &f.cx())
            .unwrap();
        // "10" as text would sort before "9"
        s.evaluate(&Predicate::binary(Operator::Lt, "${limit}"), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
    }

    #[test]
    fn right_value_follows_left_kind_without_declaration() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::Int(5), MultivaluedComparison::All);
        s.evaluate(&Predicate::binary(Operator::Eq, "5"), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
    }

    #[test]
    fn unconvertible_right_value_is_false() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::Int(5), MultivaluedComparison::All);
        s.evaluate(&Predicate::binary(Operator::Eq, "five"), None, &f.cx())
            .unwrap();
        assert!(!s.verdict);
        assert!(f.audit.contains_code(7107));
    }

    #[test]
    fn non_comparable_left_uses_text_form() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(
            Value::Record(Default::default()),
            MultivaluedComparison::All,
        );
        s.evaluate(&Predicate::binary(Operator::Eq, "{}"), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
        assert!(f.audit.contains_code(7106));
    }

    #[test]
    fn negation_inverts_result() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("a"), MultivaluedComparison::All);
        s.evaluate(&Predicate::binary(Operator::Eq, "a").negate(), None, &f.cx())
            .unwrap();
        assert!(!s.verdict);
    }

    #[test]
    fn unary_operator_ignores_right_value() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from(""), MultivaluedComparison::All);
        s.evaluate(&Predicate::unary(Operator::Empty), None, &f.cx())
            .unwrap();
        assert!(s.verdict);
    }

    #[test]
    fn binary_operator_without_right_value_is_a_policy_error() {
        let f = Fixture::new();
        let mut s = EvaluationState::new(Value::from("a"), MultivaluedComparison::All);
        assert!(s
            .evaluate(&Predicate::unary(Operator::Eq), None, &f.cx())
            .is_err());
    }

    #[test]
    fn empty_sequence_boundaries() {
        let f = Fixture::new();
        let p = Predicate::binary(Operator::Eq, "a");
        for (mode, expected) in [
            (MultivaluedComparison::All, true),
            (MultivaluedComparison::Any, false),
            (MultivaluedComparison::First, false),
            (MultivaluedComparison::Last, false),
        ] {
            let mut s = EvaluationState::new(Value::List(vec![]), mode);
            s.evaluate(&p, None, &f.cx()).unwrap();
            assert_eq!(s.verdict, expected, "{}", mode);
        }
    }
}
