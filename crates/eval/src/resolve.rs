//! Variable binding resolver.
//!
//! Binds `${...}` references to values from a per-request [`VariableMap`],
//! either one reference at a time keeping the raw value, or a whole template
//! at a time producing a string.
//!
//! Lookup finds the longest bound name that prefixes the reference,
//! case-insensitively. Whatever follows that name after a `.` is an
//! attribute path handed to the selector registry.

use std::collections::BTreeMap;

use tollgate_core::{parse, single_reference, Filter, Segment, VariableReference};

use crate::audit::{AuditEvent, AuditSink};
use crate::selector::SelectorRegistry;
use crate::types::{parse_json_value, DecodeError, ResolveError, Value};

// ──────────────────────────────────────────────
// Variable map
// ──────────────────────────────────────────────

/// Per-request name to value bindings.
///
/// Names are matched case-insensitively; the original spelling is kept for
/// display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    entries: BTreeMap<String, (String, Value)>,
}

struct Binding<'m, 'n> {
    value: &'m Value,
    /// Attribute path after the bound name, in its original case.
    remaining: Option<&'n str>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any binding that differs only in case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    /// Exact (case-insensitive) lookup, without attribute paths.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&name.to_ascii_lowercase()).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build from a JSON object. `null` members stay unbound.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DecodeError> {
        let obj = json.as_object().ok_or_else(|| DecodeError {
            message: "variables must be a JSON object".to_string(),
        })?;
        let mut vars = VariableMap::new();
        for (name, raw) in obj {
            let value = parse_json_value(raw).map_err(|e| DecodeError {
                message: format!("variable '{}': {}", name, e.message),
            })?;
            if let Some(value) = value {
                vars.insert(name.clone(), value);
            }
        }
        Ok(vars)
    }

    /// The longest bound name equal to `name` or followed in it by a `.`.
    fn lookup<'n>(&self, name: &'n str) -> Option<Binding<'_, 'n>> {
        let lname = name.to_ascii_lowercase();
        let (key, (_, value)) = self
            .entries
            .iter()
            .filter(|(key, _)| {
                lname == **key
                    || (lname.starts_with(key.as_str())
                        && lname.as_bytes().get(key.len()) == Some(&b'.'))
            })
            .max_by_key(|(key, _)| key.len())?;
        // ASCII lowercasing keeps byte offsets aligned with `name`
        let remaining = name.get(key.len() + 1..).filter(|r| !r.is_empty());
        Some(Binding { value, remaining })
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut vars = VariableMap::new();
        for (n, v) in iter {
            vars.insert(n, v);
        }
        vars
    }
}

// ──────────────────────────────────────────────
// Resolver
// ──────────────────────────────────────────────

/// Resolution over one engine's selectors, reporting to one audit sink.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    pub selectors: &'a SelectorRegistry,
    pub audit: &'a dyn AuditSink,
    /// Joins multiple values when a reference has no `|delimiter`.
    pub default_delimiter: &'a str,
}

impl<'a> Resolver<'a> {
    /// Resolve a parsed reference to zero, one or many values.
    ///
    /// A bound list with no filter is returned as a single `List` value.
    pub fn resolve_reference(
        &self,
        reference: &VariableReference,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Vec<Value>, ResolveError> {
        let name = reference.name.as_str();
        let Some(binding) = vars.lookup(name) else {
            if strict {
                self.audit.record(&AuditEvent::NoSuchVariableWarning {
                    name: name.to_string(),
                });
                return Err(ResolveError::NoSuchVariable {
                    name: name.to_string(),
                });
            }
            self.audit.record(&AuditEvent::NoSuchVariable {
                name: name.to_string(),
            });
            return Ok(Vec::new());
        };

        let value = match binding.remaining {
            None => binding.value.clone(),
            Some(path) => match self.selectors.resolve_path(binding.value, path) {
                Ok(v) => v,
                Err(miss) => {
                    self.audit.record(&AuditEvent::SelectorMiss {
                        name: name.to_string(),
                        context: miss.kind.to_string(),
                    });
                    if strict {
                        return Err(ResolveError::SelectorMiss {
                            name: name.to_string(),
                            context: miss.kind.to_string(),
                        });
                    }
                    return Ok(Vec::new());
                }
            },
        };

        Ok(match reference.filter {
            None => vec![value],
            Some(filter) => self.apply_filter(name, value.into_elements(), filter),
        })
    }

    fn apply_filter(&self, name: &str, mut values: Vec<Value>, filter: Filter) -> Vec<Value> {
        match filter {
            Filter::Index { index } => {
                if index < values.len() {
                    vec![values.swap_remove(index)]
                } else {
                    self.audit.record(&AuditEvent::SubscriptOutOfRange {
                        name: name.to_string(),
                        index,
                        len: values.len(),
                    });
                    Vec::new()
                }
            }
            Filter::Range { start, end } => {
                if start >= values.len() {
                    return Vec::new();
                }
                let end = end.min(values.len() - 1);
                values.drain(start..=end).collect()
            }
        }
    }

    /// Resolve the text inside one `${...}`, e.g. `foo[1]` or `request.http.status`.
    ///
    /// Many values collapse into one `List`; none is `Ok(None)`.
    pub fn resolve_one(
        &self,
        raw_name: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Option<Value>, ResolveError> {
        let Some(reference) = VariableReference::parse_body(raw_name)? else {
            return Ok(None);
        };
        let values = self.resolve_reference(&reference, vars, strict)?;
        Ok(collapse(values))
    }

    /// Resolve an expression without losing type information when it is a
    /// single reference. Anything else is expanded to `Text`.
    pub fn resolve_expression(
        &self,
        expression: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Option<Value>, ResolveError> {
        match single_reference(expression)? {
            Some(reference) => {
                let values = self.resolve_reference(&reference, vars, strict)?;
                Ok(collapse(values))
            }
            None => Ok(Some(Value::Text(self.expand(expression, vars, strict)?))),
        }
    }

    /// Replace every reference in `template` with its text form.
    ///
    /// Absent values render as the empty string. The output is never
    /// rescanned, so `$` in a substituted value stays literal.
    pub fn expand(
        &self,
        template: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<String, ResolveError> {
        let mut out = String::with_capacity(template.len());
        for segment in parse(template) {
            match segment? {
                Segment::Literal(text) => out.push_str(text),
                Segment::Reference(reference) => {
                    let values = self.resolve_reference(&reference, vars, strict)?;
                    let delimiter = reference
                        .delimiter
                        .as_deref()
                        .unwrap_or(self.default_delimiter);
                    let mut first = true;
                    for value in values.into_iter().flat_map(Value::into_elements) {
                        if !first {
                            out.push_str(delimiter);
                        }
                        first = false;
                        out.push_str(&self.render(&reference.name, &value, strict)?);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Like [`expand`](Self::expand) but keeps each value unformatted:
    /// literal spans become `Text` and list values contribute one entry
    /// per element.
    pub fn expand_values(
        &self,
        template: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Vec<Value>, ResolveError> {
        let mut out = Vec::new();
        for segment in parse(template) {
            match segment? {
                Segment::Literal(text) => out.push(Value::text(text)),
                Segment::Reference(reference) => {
                    let values = self.resolve_reference(&reference, vars, strict)?;
                    out.extend(values.into_iter().flat_map(Value::into_elements));
                }
            }
        }
        Ok(out)
    }

    fn render(&self, name: &str, value: &Value, strict: bool) -> Result<String, ResolveError> {
        let kind = value.kind();
        if kind.is_context_object() {
            if strict {
                return Err(ResolveError::SuspiciousToString {
                    name: name.to_string(),
                    kind,
                });
            }
            self.audit.record(&AuditEvent::SuspiciousToString {
                name: name.to_string(),
                kind,
            });
        }
        Ok(value.to_text())
    }
}

/// Zero values is absent, one is itself, more is a list.
pub fn collapse(mut values: Vec<Value>) -> Option<Value> {
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::List(values)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use crate::types::{Message, PartInfo, ValueKind};
    use pretty_assertions::assert_eq;
    use tollgate_core::SyntaxError;

    struct Fixture {
        selectors: SelectorRegistry,
        audit: MemoryAudit,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                selectors: SelectorRegistry::standard(),
                audit: MemoryAudit::new(),
            }
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver {
                selectors: &self.selectors,
                audit: &self.audit,
                default_delimiter: ", ",
            }
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("MixedCase", "v");
        assert_eq!(
            f.resolver().resolve_one("mixedcase", &vars, true).unwrap(),
            Some(Value::from("v"))
        );
        assert_eq!(vars.get("MIXEDCASE"), Some(&Value::from("v")));
        assert_eq!(vars.names().collect::<Vec<_>>(), vec!["MixedCase"]);
    }

    #[test]
    fn longest_prefix_wins() {
        let f = Fixture::new();
        let vars = VariableMap::new()
            .with("request", Message::new().with_status(500))
            .with("request.http.status", "shadowed");
        assert_eq!(
            f.resolver()
                .resolve_one("request.http.status", &vars, true)
                .unwrap(),
            Some(Value::from("shadowed"))
        );
    }

    #[test]
    fn prefix_must_end_at_a_dot() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", "x");
        assert_eq!(f.resolver().resolve_one("foobar", &vars, false).unwrap(), None);
        assert!(f.audit.contains_code(-6));
    }

    #[test]
    fn selector_path_after_bound_name() {
        let f = Fixture::new();
        let msg = Message::new()
            .with_header("SOAPAction", "urn:x")
            .with_part(PartInfo::new("text/xml", "<a/>"));
        let vars = VariableMap::new().with("request", msg);
        let r = f.resolver();
        assert_eq!(
            r.resolve_one("request.http.header.soapaction", &vars, true)
                .unwrap(),
            Some(Value::from("urn:x"))
        );
        assert_eq!(
            r.resolve_one("Request.MainPart", &vars, true).unwrap(),
            Some(Value::from("<a/>"))
        );
    }

    #[test]
    fn selector_miss_lenient_and_strict() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("request", Message::new());
        let r = f.resolver();
        assert_eq!(r.resolve_one("request.bogus", &vars, false).unwrap(), None);
        assert!(f.audit.contains_code(-11));
        assert!(matches!(
            r.resolve_one("request.bogus", &vars, true),
            Err(ResolveError::SelectorMiss { .. })
        ));
    }

    #[test]
    fn trailing_suffix_on_text_is_a_miss() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("certificate.subject", "cn=bob");
        assert_eq!(
            f.resolver()
                .expand("${certificate.subject.nonexistent}", &vars, false)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn missing_variable_strictness() {
        let f = Fixture::new();
        let vars = VariableMap::new();
        let r = f.resolver();
        assert_eq!(r.expand("${missing}", &vars, false).unwrap(), "");
        assert_eq!(
            r.expand("${missing}", &vars, true),
            Err(ResolveError::NoSuchVariable {
                name: "missing".into()
            })
        );
        assert_eq!(f.audit.codes(), vec![-6, -10]);
    }

    #[test]
    fn index_and_range_filters() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", vec!["a", "b", "c", "d"]);
        let r = f.resolver();
        assert_eq!(r.expand("${foo[1]}", &vars, false).unwrap(), "b");
        assert_eq!(r.expand("${foo[1-2]|;}", &vars, false).unwrap(), "b;c");
        assert_eq!(r.expand("${foo[2-9]}", &vars, false).unwrap(), "c, d");
        assert_eq!(r.expand("${foo[7-9]}", &vars, false).unwrap(), "");
        assert_eq!(
            r.resolve_one("foo[0-1]", &vars, false).unwrap(),
            Some(Value::from(vec!["a", "b"]))
        );
    }

    #[test]
    fn out_of_range_index_is_audited_and_empty() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", vec!["a"]);
        assert_eq!(f.resolver().expand("${foo[5]}", &vars, true).unwrap(), "");
        assert_eq!(
            f.audit.events(),
            vec![AuditEvent::SubscriptOutOfRange {
                name: "foo".into(),
                index: 5,
                len: 1
            }]
        );
    }

    #[test]
    fn subscript_on_scalar_treats_it_as_one_element() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", "only");
        let r = f.resolver();
        assert_eq!(r.expand("${foo[0]}", &vars, false).unwrap(), "only");
        assert_eq!(r.expand("${foo[1]}", &vars, false).unwrap(), "");
    }

    #[test]
    fn bad_subscript_raises_even_when_lenient() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", vec!["a"]);
        assert!(matches!(
            f.resolver().expand("${foo[asdf]}", &vars, false),
            Err(ResolveError::Syntax(SyntaxError::NonNumericSubscript { .. }))
        ));
    }

    #[test]
    fn delimiters() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("foo", vec!["bar", "baz"]);
        let r = f.resolver();
        assert_eq!(r.expand("${foo}", &vars, false).unwrap(), "bar, baz");
        assert_eq!(r.expand("${foo|}", &vars, false).unwrap(), "barbaz");
        assert_eq!(r.expand("${foo||}", &vars, false).unwrap(), "bar|baz");
        assert_eq!(
            r.expand("<val>${foo|</val><val>}</val>", &vars, false)
                .unwrap(),
            "<val>bar</val><val>baz</val>"
        );
    }

    #[test]
    fn substituted_dollar_is_not_rescanned() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("a", "${b}").with("b", "no");
        assert_eq!(f.resolver().expand("x${a}x", &vars, true).unwrap(), "x${b}x");
    }

    #[test]
    fn pure_reference_keeps_raw_value() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("x", vec![1, 2, 3]);
        let r = f.resolver();
        assert_eq!(
            r.resolve_expression("${x}", &vars, false).unwrap(),
            Some(Value::from(vec![1, 2, 3]))
        );
        assert_eq!(
            r.resolve_expression("[${x}]", &vars, false).unwrap(),
            Some(Value::from("[1, 2, 3]"))
        );
        assert_eq!(r.resolve_expression("${nope}", &vars, false).unwrap(), None);
    }

    #[test]
    fn context_object_text_form_is_suspicious() {
        let f = Fixture::new();
        let msg = Message::new().with_part(PartInfo::new("text/plain", "body"));
        let vars = VariableMap::new().with("request", msg);
        let r = f.resolver();
        assert_eq!(r.expand("${request}", &vars, false).unwrap(), "body");
        assert!(f.audit.contains_code(-13));
        assert_eq!(
            r.expand("${request}", &vars, true),
            Err(ResolveError::SuspiciousToString {
                name: "request".into(),
                kind: ValueKind::Message
            })
        );
    }

    #[test]
    fn expand_values_keeps_types() {
        let f = Fixture::new();
        let vars = VariableMap::new().with("n", 5i64).with("l", vec![1, 2]);
        assert_eq!(
            f.resolver()
                .expand_values("n=${n} l=${l}", &vars, false)
                .unwrap(),
            vec![
                Value::from("n="),
                Value::Int(5),
                Value::from(" l="),
                Value::Int(1),
                Value::Int(2),
            ]
        );
    }

    #[test]
    fn variables_from_json() {
        let vars = VariableMap::from_json(&serde_json::json!({
            "a": "1", "gone": null, "when": {"$datetime": "2020-01-01T00:00:00Z"}
        }))
        .unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("WHEN").map(Value::kind), Some(ValueKind::DateTime));
        assert!(VariableMap::from_json(&serde_json::json!([1])).is_err());
    }
}
