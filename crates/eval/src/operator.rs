//! Comparison operators over runtime values.
//!
//! Ordering is defined within a kind, plus `Int`/`Decimal` promotion. All
//! decimal arithmetic uses `rust_decimal`, never `f64`. Anything else is
//! reported as [`NotComparable`] and the caller decides what that means.

use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::types::{Operator, Value, ValueKind};

/// The operator was handed two values it has no ordering for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotComparable {
    pub left: ValueKind,
    pub right: ValueKind,
}

/// Evaluate a unary operator. Binary operators yield `false`.
pub fn evaluate_unary(op: Operator, left: &Value) -> bool {
    match op {
        Operator::Empty => left.to_text().is_empty(),
        Operator::True => is_bool_like(left, true),
        Operator::False => is_bool_like(left, false),
        _ => false,
    }
}

fn is_bool_like(v: &Value, expected: bool) -> bool {
    match v {
        Value::Bool(b) => *b == expected,
        Value::Text(s) => s.trim().eq_ignore_ascii_case(if expected { "true" } else { "false" }),
        _ => false,
    }
}

/// Evaluate a binary operator. Unary operators ignore `right`.
pub fn evaluate_binary(
    op: Operator,
    left: &Value,
    right: &Value,
    case_sensitive: bool,
) -> Result<bool, NotComparable> {
    if op.is_unary() {
        return Ok(evaluate_unary(op, left));
    }
    if op == Operator::Contains {
        return Ok(contains(left, right, case_sensitive));
    }
    let ord = ordering(left, right, case_sensitive).ok_or(NotComparable {
        left: left.kind(),
        right: right.kind(),
    })?;
    Ok(match op {
        Operator::Eq => ord == Ordering::Equal,
        Operator::Ne => ord != Ordering::Equal,
        Operator::Lt => ord == Ordering::Less,
        Operator::Le => ord != Ordering::Greater,
        Operator::Gt => ord == Ordering::Greater,
        Operator::Ge => ord != Ordering::Less,
        _ => false,
    })
}

fn contains(left: &Value, right: &Value, case_sensitive: bool) -> bool {
    let (l, r) = (left.to_text(), right.to_text());
    if case_sensitive {
        l.contains(&r)
    } else {
        l.to_lowercase().contains(&r.to_lowercase())
    }
}

/// Order two values, or `None` when they are not comparable.
pub fn ordering(left: &Value, right: &Value, case_sensitive: bool) -> Option<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Some(if case_sensitive {
            a.cmp(b)
        } else {
            a.to_lowercase().cmp(&b.to_lowercase())
        }),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
        (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&Decimal::from(*b))),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
