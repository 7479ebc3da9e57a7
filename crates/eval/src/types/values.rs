//! Runtime value types and JSON parsing helpers.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use super::message::{Message, MessageJson, PartInfo};
use super::DecodeError;

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

/// A value bound to a variable, produced by a selector, or produced by a
/// conversion. Context objects are shared behind `Arc` so cloning a value
/// never copies a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    DateTime(OffsetDateTime),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Message(Arc<Message>),
    Part(Arc<PartInfo>),
}

/// The runtime shape of a [`Value`], without its payload.
///
/// Selectors are registered per kind, and audit messages name kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Text,
    Int,
    Decimal,
    Bool,
    DateTime,
    List,
    Record,
    Message,
    Part,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Text => "Text",
            ValueKind::Int => "Int",
            ValueKind::Decimal => "Decimal",
            ValueKind::Bool => "Bool",
            ValueKind::DateTime => "DateTime",
            ValueKind::List => "List",
            ValueKind::Record => "Record",
            ValueKind::Message => "Message",
            ValueKind::Part => "Part",
        }
    }

    /// Kinds that an operator can order or test for equality.
    pub fn is_comparable(self) -> bool {
        matches!(
            self,
            ValueKind::Text
                | ValueKind::Int
                | ValueKind::Decimal
                | ValueKind::Bool
                | ValueKind::DateTime
        )
    }

    /// Context objects whose text form is rarely what a template author wants.
    pub fn is_context_object(self) -> bool {
        matches!(self, ValueKind::Message | ValueKind::Part | ValueKind::Record)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Int(_) => ValueKind::Int,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Bool(_) => ValueKind::Bool,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
            Value::Message(_) => ValueKind::Message,
            Value::Part(_) => ValueKind::Part,
        }
    }

    /// Returns a human-readable type name for audit messages.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_comparable(&self) -> bool {
        self.kind().is_comparable()
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    /// Render the value the way template expansion shows it.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => format_iso_millis(*dt),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Record(fields) => {
                let inner = fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.to_text()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", inner)
            }
            Value::Message(m) => m
                .main_part()
                .and_then(PartInfo::body_text)
                .unwrap_or_default(),
            Value::Part(p) => p.body_text().unwrap_or_default(),
        }
    }

    /// Flatten into an ordered sequence: a list yields its elements, any
    /// other value yields itself.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// ISO-8601 with millisecond precision in the value's own offset:
/// `2024-01-02T03:04:05.678Z` for UTC, `2024-01-02T05:04:05.678+02:00` otherwise.
pub fn format_iso_millis(dt: OffsetDateTime) -> String {
    let formatted = if dt.offset().is_utc() {
        dt.format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
    } else {
        dt.format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory]:[offset_minute]"
        ))
    };
    formatted.unwrap_or_default()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

/// Bound date-times are held in UTC; only zone views carry another offset.
impl From<OffsetDateTime> for Value {
    fn from(dt: OffsetDateTime) -> Self {
        Value::DateTime(dt.to_offset(UtcOffset::UTC))
    }
}

impl From<Message> for Value {
    fn from(m: Message) -> Self {
        Value::Message(Arc::new(m))
    }
}

impl From<PartInfo> for Value {
    fn from(p: PartInfo) -> Self {
        Value::Part(Arc::new(p))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// ──────────────────────────────────────────────
// JSON parsing helpers
// ──────────────────────────────────────────────

/// Parse a JSON value into a runtime value.
///
/// `null` means unbound and yields `Ok(None)`; `null` elements of arrays
/// and `null` record fields are dropped.
pub fn parse_json_value(json: &serde_json::Value) -> Result<Option<Value>, DecodeError> {
    let value = match json {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Decimal(parse_decimal_number(&n.to_string())?),
        },
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = parse_json_value(item)? {
                    out.push(v);
                }
            }
            Value::List(out)
        }
        serde_json::Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some(raw) = obj.get("$datetime") {
                    return parse_datetime_json(raw).map(Some);
                }
                if let Some(raw) = obj.get("$message") {
                    let parsed: MessageJson =
                        serde_json::from_value(raw.clone()).map_err(|e| DecodeError {
                            message: format!("invalid $message: {}", e),
                        })?;
                    return Ok(Some(Value::from(Message::from(parsed))));
                }
            }
            let mut fields = BTreeMap::new();
            for (k, v) in obj {
                if let Some(v) = parse_json_value(v)? {
                    fields.insert(k.clone(), v);
                }
            }
            Value::Record(fields)
        }
    };
    Ok(Some(value))
}

fn parse_decimal_number(s: &str) -> Result<Decimal, DecodeError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| DecodeError {
            message: format!("number '{}' is out of decimal range", s),
        })
}

fn parse_datetime_json(raw: &serde_json::Value) -> Result<Value, DecodeError> {
    let s = raw.as_str().ok_or_else(|| DecodeError {
        message: "$datetime must be a string".to_string(),
    })?;
    OffsetDateTime::parse(s, &Rfc3339)
        .map(Value::from)
        .map_err(|e| DecodeError {
            message: format!("invalid $datetime '{}': {}", s, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn text_forms() {
        assert_eq!(Value::from(vec![1, 2, 3]).to_text(), "1, 2, 3");
        assert_eq!(Value::Decimal(Decimal::new(150, 2)).to_text(), "1.50");
        assert_eq!(
            Value::from(datetime!(2024-01-02 03:04:05.678 +02:00)).to_text(),
            "2024-01-02T01:04:05.678Z"
        );
        assert_eq!(
            Value::DateTime(datetime!(2024-01-02 03:04:05.678 +02:00)).to_text(),
            "2024-01-02T03:04:05.678+02:00"
        );
        let mut rec = BTreeMap::new();
        rec.insert("a".to_string(), Value::Int(1));
        rec.insert("b".to_string(), Value::from("x"));
        assert_eq!(Value::Record(rec).to_text(), "{a=1, b=x}");
    }

    #[test]
    fn message_text_form_is_textual_main_part() {
        let msg = Message::new().with_part(PartInfo::new("text/xml", "<a/>"));
        assert_eq!(Value::from(msg).to_text(), "<a/>");
        let bin = Message::new().with_part(PartInfo::new("image/png", vec![0u8, 1, 2]));
        assert_eq!(Value::from(bin).to_text(), "");
    }

    #[test]
    fn parse_json_scalars_and_containers() {
        let json = serde_json::json!({
            "s": "x", "i": 3, "d": 1.25, "b": true, "n": null, "l": [1, null, "a"]
        });
        let Some(Value::Record(fields)) = parse_json_value(&json).unwrap() else {
            panic!("expected record");
        };
        assert_eq!(fields["s"], Value::from("x"));
        assert_eq!(fields["i"], Value::Int(3));
        assert_eq!(fields["d"], Value::Decimal(Decimal::new(125, 2)));
        assert_eq!(fields["b"], Value::Bool(true));
        assert!(!fields.contains_key("n"));
        assert_eq!(
            fields["l"],
            Value::List(vec![Value::Int(1), Value::from("a")])
        );
    }

    #[test]
    fn parse_json_tagged_objects() {
        let dt = parse_json_value(&serde_json::json!({"$datetime": "2024-05-06T07:08:09Z"}))
            .unwrap()
            .unwrap();
        assert_eq!(dt, Value::DateTime(datetime!(2024-05-06 07:08:09 UTC)));

        let msg = parse_json_value(&serde_json::json!({"$message": {"status": 404}}))
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), ValueKind::Message);

        assert!(parse_json_value(&serde_json::json!({"$datetime": "yesterday"})).is_err());
    }
}
