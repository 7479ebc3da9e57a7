//! Selector registry: resolves dotted attribute paths against context values.
//!
//! A selector is registered per [`ValueKind`]. Resolving a path may pass
//! through several selectors: `request.parts.2.contenttype` asks the message
//! selector for `parts`, the list selector for `2`, and the part selector
//! for `contenttype`. The registry is built once and then only read.

pub mod datetime;
pub mod list;
pub mod message;
pub mod part;
pub mod record;

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Value, ValueKind};

pub use datetime::DateTimeSelector;
pub use list::ListSelector;
pub use message::MessageSelector;
pub use part::PartSelector;
pub use record::RecordSelector;

/// What a selector found, plus the part of the path it did not consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub value: Value,
    pub remaining: Option<String>,
}

impl Selection {
    /// The whole path was consumed.
    pub fn done(value: impl Into<Value>) -> Self {
        Selection {
            value: value.into(),
            remaining: None,
        }
    }

    /// `remaining` is resolved against `value` by the next selector.
    pub fn partial(value: impl Into<Value>, remaining: Option<&str>) -> Self {
        Selection {
            value: value.into(),
            remaining: remaining.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }
}

/// Resolves one step of an attribute path against one kind of value.
///
/// Returning `None` means the path is not recognized for this value.
/// Selectors never mutate the context.
pub trait Selector: Send + Sync {
    fn select(&self, context: &Value, path: &str) -> Option<Selection>;
}

/// Where a path stopped resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMiss {
    pub kind: ValueKind,
    pub path: String,
}

/// Kind-keyed dispatch table.
#[derive(Clone, Default)]
pub struct SelectorRegistry {
    selectors: HashMap<ValueKind, Arc<dyn Selector>>,
}

impl std::fmt::Debug for SelectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.selectors.keys().collect();
        kinds.sort();
        f.debug_struct("SelectorRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl SelectorRegistry {
    /// A registry with no selectors; every path misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in selectors for messages, parts, lists, date-times and records.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(ValueKind::Message, MessageSelector);
        registry.register(ValueKind::Part, PartSelector);
        registry.register(ValueKind::List, ListSelector);
        registry.register(ValueKind::DateTime, DateTimeSelector::detect());
        registry.register(ValueKind::Record, RecordSelector);
        registry
    }

    /// Register or replace the selector for `kind`.
    pub fn register(&mut self, kind: ValueKind, selector: impl Selector + 'static) {
        self.selectors.insert(kind, Arc::new(selector));
    }

    pub fn get(&self, kind: ValueKind) -> Option<&dyn Selector> {
        self.selectors.get(&kind).map(|s| s.as_ref())
    }

    /// Follow `path` from `context` through as many selectors as it takes.
    pub fn resolve_path(&self, context: &Value, path: &str) -> Result<Value, PathMiss> {
        let mut current = context.clone();
        let mut path = path.to_string();
        loop {
            let miss = || PathMiss {
                kind: current.kind(),
                path: path.clone(),
            };
            let selector = self.get(current.kind()).ok_or_else(miss)?;
            let selection = selector.select(&current, &path).ok_or_else(miss)?;
            match selection.remaining {
                None => return Ok(selection.value),
                Some(rest) => {
                    current = selection.value;
                    path = rest;
                }
            }
        }
    }
}

/// Split `a.b.c` into `("a", Some("b.c"))`.
pub(crate) fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Strip a case-insensitive ASCII prefix.
pub(crate) fn strip_prefix_ci<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&path[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, PartInfo};

    #[test]
    fn chains_across_kinds() {
        let msg = Message::new()
            .with_part(PartInfo::new("text/xml", "<a/>"))
            .with_part(PartInfo::new("text/plain", "second"));
        let ctx = Value::from(msg);
        let reg = SelectorRegistry::standard();
        assert_eq!(
            reg.resolve_path(&ctx, "parts.2.contenttype"),
            Ok(Value::from("text/plain"))
        );
        assert_eq!(reg.resolve_path(&ctx, "Parts.2.Body"), Ok(Value::from("second")));
    }

    #[test]
    fn miss_names_the_kind_where_resolution_stopped() {
        let reg = SelectorRegistry::standard();
        let ctx = Value::from(vec!["a", "b"]);
        assert_eq!(
            reg.resolve_path(&ctx, "1.nope"),
            Err(PathMiss {
                kind: ValueKind::Text,
                path: "nope".to_string()
            })
        );
    }

    #[test]
    fn empty_registry_misses() {
        let reg = SelectorRegistry::empty();
        assert!(reg.resolve_path(&Value::from(vec![1]), "length").is_err());
    }

    #[test]
    fn custom_selector_registration() {
        struct Upper;
        impl Selector for Upper {
            fn select(&self, context: &Value, path: &str) -> Option<Selection> {
                (path == "upper").then(|| Selection::done(context.to_text().to_uppercase()))
            }
        }
        let mut reg = SelectorRegistry::empty();
        reg.register(ValueKind::Text, Upper);
        assert_eq!(
            reg.resolve_path(&Value::from("abc"), "upper"),
            Ok(Value::from("ABC"))
        );
    }

    #[test]
    fn strip_prefix_is_case_insensitive() {
        assert_eq!(strip_prefix_ci("HTTP.Header.X", "http.header."), Some("X"));
        assert_eq!(strip_prefix_ci("ht", "http."), None);
    }
}
