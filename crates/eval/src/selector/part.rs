//! Attributes of one MIME part.

use super::message::len_value;
use super::{strip_prefix_ci, Selection, Selector};
use crate::types::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct PartSelector;

impl Selector for PartSelector {
    fn select(&self, context: &Value, path: &str) -> Option<Selection> {
        let Value::Part(part) = context else {
            return None;
        };
        if let Some(name) = strip_prefix_ci(path, "header.") {
            return part.header(name).map(Selection::done);
        }
        match path.to_ascii_lowercase().as_str() {
            "body" => part.body_text().map(Selection::done),
            "contenttype" => Some(Selection::done(part.content_type.as_str())),
            "size" => Some(Selection::done(len_value(part.body.len()))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PartInfo;

    #[test]
    fn part_attributes() {
        let part = Value::from(PartInfo::new("text/plain", "hello").with_header("X-Id", "7"));
        let get = |p: &str| PartSelector.select(&part, p).map(|s| s.value);
        assert_eq!(get("body"), Some(Value::from("hello")));
        assert_eq!(get("ContentType"), Some(Value::from("text/plain")));
        assert_eq!(get("size"), Some(Value::Int(5)));
        assert_eq!(get("header.x-id"), Some(Value::from("7")));
        assert_eq!(get("header.missing"), None);
        assert_eq!(get("bogus"), None);
    }

    #[test]
    fn binary_body_misses() {
        let part = Value::from(PartInfo::new("application/octet-stream", "x"));
        assert!(PartSelector.select(&part, "body").is_none());
    }
}
