//! Type coercion service.
//!
//! Conversion is best effort: a value that cannot be represented in the
//! target type yields `None`, never an error. The caller decides whether
//! that is a failed predicate or a fallback.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::types::{DataType, Value};

/// Converts values between representations.
pub trait Converter: Send + Sync {
    fn convert(&self, value: &Value, target: DataType) -> Option<Value>;

    /// Convert `value` to the representation `template` already has.
    fn convert_like(&self, value: &Value, template: &Value) -> Option<Value> {
        self.convert(value, DataType::for_kind(template.kind()))
    }
}

/// The conversions every engine starts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl Converter for StandardConverter {
    fn convert(&self, value: &Value, target: DataType) -> Option<Value> {
        if target.accepts(value.kind()) {
            return Some(value.clone());
        }
        match (target, value) {
            (_, Value::List(_)) | (_, Value::Record(_)) => None,
            (DataType::String, Value::Message(m)) => m
                .main_part()
                .and_then(|p| p.body_text())
                .map(Value::Text),
            (DataType::String, Value::Part(p)) => p.body_text().map(Value::Text),
            (DataType::String, other) => Some(Value::Text(other.to_text())),

            (DataType::Integer, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Int),
            (DataType::Integer, Value::Decimal(d)) if d.fract().is_zero() => {
                d.to_i64().map(Value::Int)
            }

            (DataType::Decimal, Value::Text(s)) => parse_decimal(s.trim()).map(Value::Decimal),
            (DataType::Decimal, Value::Int(i)) => Some(Value::Decimal(Decimal::from(*i))),

            (DataType::Boolean, Value::Text(s)) => parse_bool(s.trim()).map(Value::Bool),

            (DataType::DateTime, Value::Text(s)) => parse_datetime(s.trim()).map(Value::DateTime),
            (DataType::DateTime, Value::Int(millis)) => from_epoch_millis(*millis).map(Value::DateTime),

            _ => None,
        }
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// RFC 3339, a bare `YYYY-MM-DD` at midnight UTC, or epoch milliseconds.
fn parse_datetime(s: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt.to_offset(UtcOffset::UTC));
    }
    if let Ok(date) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }
    s.parse::<i64>().ok().and_then(from_epoch_millis)
}

fn from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, PartInfo};
    use time::macros::datetime;

    fn conv(v: impl Into<Value>, t: DataType) -> Option<Value> {
        StandardConverter.convert(&v.into(), t)
    }

    #[test]
    fn text_to_numbers() {
        assert_eq!(conv(" 42 ", DataType::Integer), Some(Value::Int(42)));
        assert_eq!(conv("4.2", DataType::Integer), None);
        assert_eq!(
            conv("4.20", DataType::Decimal),
            Some(Value::Decimal(Decimal::new(420, 2)))
        );
        assert_eq!(conv("abc", DataType::Decimal), None);
    }

    #[test]
    fn numeric_cross_conversions() {
        assert_eq!(
            conv(7i64, DataType::Decimal),
            Some(Value::Decimal(Decimal::from(7)))
        );
        assert_eq!(
            conv(Decimal::new(700, 2), DataType::Integer),
            Some(Value::Int(7))
        );
        assert_eq!(conv(Decimal::new(701, 2), DataType::Integer), None);
    }

    #[test]
    fn text_to_bool_is_case_insensitive() {
        assert_eq!(conv("TRUE", DataType::Boolean), Some(Value::Bool(true)));
        assert_eq!(conv("False", DataType::Boolean), Some(Value::Bool(false)));
        assert_eq!(conv("yes", DataType::Boolean), None);
    }

    #[test]
    fn text_and_int_to_datetime() {
        assert_eq!(
            conv("2024-03-04T05:06:07Z", DataType::DateTime),
            Some(Value::DateTime(datetime!(2024-03-04 05:06:07 UTC)))
        );
        assert_eq!(
            conv("2024-03-04", DataType::DateTime),
            Some(Value::DateTime(datetime!(2024-03-04 00:00 UTC)))
        );
        assert_eq!(
            conv(1_000i64, DataType::DateTime),
            Some(Value::DateTime(datetime!(1970-01-01 00:00:01 UTC)))
        );
        assert_eq!(conv("soon", DataType::DateTime), None);
    }

    #[test]
    fn anything_scalar_to_string() {
        assert_eq!(conv(5i64, DataType::String), Some(Value::from("5")));
        assert_eq!(conv(true, DataType::String), Some(Value::from("true")));
        assert_eq!(conv(vec!["a"], DataType::String), None);
    }

    #[test]
    fn message_to_string_only_if_textual() {
        let text = Message::new().with_part(PartInfo::new("text/plain", "hi"));
        assert_eq!(conv(text, DataType::String), Some(Value::from("hi")));
        let bin = Message::new().with_part(PartInfo::new("application/octet-stream", "hi"));
        assert_eq!(conv(bin, DataType::String), None);
        assert_eq!(conv("x", DataType::Message), None);
    }

    #[test]
    fn convert_like_uses_template_kind() {
        let left = Value::Int(3);
        assert_eq!(
            StandardConverter.convert_like(&Value::from("3"), &left),
            Some(Value::Int(3))
        );
    }

    #[test]
    fn unknown_accepts_everything_unchanged() {
        let v = Value::from(vec![1, 2]);
        assert_eq!(StandardConverter.convert(&v, DataType::Unknown), Some(v));
    }
}
