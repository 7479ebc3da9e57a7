//! Field access on records, case-insensitive, longest field name wins.

use super::{Selection, Selector};
use crate::types::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordSelector;

impl Selector for RecordSelector {
    fn select(&self, context: &Value, path: &str) -> Option<Selection> {
        let Value::Record(fields) = context else {
            return None;
        };
        let lpath = path.to_ascii_lowercase();
        let (key, value) = fields
            .iter()
            .filter(|(k, _)| {
                let lk = k.to_ascii_lowercase();
                lpath == lk || (lpath.starts_with(&lk) && lpath.as_bytes().get(lk.len()) == Some(&b'.'))
            })
            .max_by_key(|(k, _)| k.len())?;
        let rest = path.get(key.len() + 1..);
        Some(Selection::partial(value.clone(), rest))
    }
}
