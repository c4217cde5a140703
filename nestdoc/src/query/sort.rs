use crate::collection::Document;
use crate::common::Value;
use std::cmp::Ordering;

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Reads a loosely typed direction flag.
    ///
    /// Null, `false`, zero or negative numbers, the empty string, `"0"`,
    /// `"false"` and negative numeric strings mean descending. Anything else
    /// is ascending.
    pub fn from_flag(flag: &Value) -> SortOrder {
        let descending = match flag {
            Value::Null => true,
            Value::Bool(v) => !*v,
            Value::I64(v) => *v <= 0,
            Value::F64(v) => *v <= 0.0,
            Value::String(v) => {
                let v = v.trim();
                v.is_empty()
                    || v == "0"
                    || v.eq_ignore_ascii_case("false")
                    || v.parse::<f64>().map(|n| n < 0.0).unwrap_or(false)
            }
            Value::Array(v) => v.is_empty(),
            Value::Document(v) => v.is_empty(),
        };

        if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

/// Ordered list of sort keys.
///
/// Values are compared through their plain string form, so `"10"` sorts
/// before `"9"`. A missing field compares as the empty string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> Self {
        SortSpec { keys: Vec::new() }
    }

    pub fn by(mut self, field: &str, order: SortOrder) -> Self {
        self.keys.push((field.to_string(), order));
        self
    }

    /// Builds a spec from `field: flag` pairs, in document key order.
    pub fn from_document(document: &Document) -> Self {
        SortSpec {
            keys: document
                .iter()
                .map(|(field, flag)| (field.clone(), SortOrder::from_flag(flag)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    /// Compares two documents key by key; ties fall through to the next key.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in self.keys.iter() {
            let left = a.get(field).to_plain_string();
            let right = b.get(field).to_plain_string();
            let ordering = match order {
                SortOrder::Ascending => left.cmp(&right),
                SortOrder::Descending => right.cmp(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
