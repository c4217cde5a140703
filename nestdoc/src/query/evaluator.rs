use crate::collection::Document;
use crate::common::Value;
use crate::query::{Criteria, FieldSelector, FindOptions, SortSpec};
use itertools::Itertools;

/// Keeps the documents matching `criteria`, then projects them through
/// `fields`.
///
/// The two passes are independent: projection applies even when `criteria`
/// is empty.
pub fn filter(items: Vec<Document>, criteria: &Criteria, fields: &FieldSelector) -> Vec<Document> {
    let matching: Vec<Document> = if criteria.is_empty() {
        items
    } else {
        items
            .into_iter()
            .filter(|item| criteria.matches(item))
            .collect()
    };

    if fields.is_empty() {
        matching
    } else {
        matching.iter().map(|item| fields.project(item)).collect()
    }
}

/// Stable multi-key sort.
pub fn sort(items: Vec<Document>, spec: &SortSpec) -> Vec<Document> {
    if spec.is_empty() {
        return items;
    }
    items
        .into_iter()
        .sorted_by(|a, b| spec.compare(a, b))
        .collect()
}

/// Returns the window of `items` starting at `offset` holding at most `limit`
/// documents.
///
/// A negative offset counts as zero; a missing, zero or negative limit means
/// no limit.
pub fn paginate(items: Vec<Document>, limit: Option<i64>, offset: i64) -> Vec<Document> {
    let offset = offset.max(0) as usize;
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) if limit > 0 => iter.take(limit as usize).collect(),
        _ => iter.collect(),
    }
}

/// Reads an offset from a loosely typed value; anything non-numeric is 0.
pub fn coerce_offset(value: &Value) -> i64 {
    coerce_number(value).map(|n| n.max(0)).unwrap_or(0)
}

/// Reads a limit from a loosely typed value; anything non-numeric, zero or
/// negative is `None` (unbounded).
pub fn coerce_limit(value: &Value) -> Option<i64> {
    coerce_number(value).filter(|n| *n > 0)
}

fn coerce_number(value: &Value) -> Option<i64> {
    match value {
        Value::I64(n) => Some(*n),
        Value::F64(n) if n.is_finite() => Some(n.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
        }
        _ => None,
    }
}

/// Runs sort, filter and paginate in that order.
///
/// Returns the page and the number of documents matching before pagination.
pub fn evaluate(items: Vec<Document>, options: &FindOptions) -> (Vec<Document>, usize) {
    let sorted = sort(items, &options.sorts);
    let filtered = filter(sorted, &options.criteria, &options.fields);
    let total = filtered.len();
    (paginate(filtered, options.limit, options.offset), total)
}
