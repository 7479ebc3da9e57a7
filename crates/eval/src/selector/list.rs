//! `length` and 1-based element access on lists.

use super::message::len_value;
use super::{split_first, Selection, Selector};
use crate::types::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListSelector;

impl Selector for ListSelector {
    fn select(&self, context: &Value, path: &str) -> Option<Selection> {
        let Value::List(items) = context else {
            return None;
        };
        let (head, rest) = split_first(path);
        if head.eq_ignore_ascii_case("length") && rest.is_none() {
            return Some(Selection::done(len_value(items.len())));
        }
        if !head.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: usize = head.parse().ok()?;
        let item = items.get(n.checked_sub(1)?)?;
        Some(Selection::partial(item.clone(), rest))
    }
}
