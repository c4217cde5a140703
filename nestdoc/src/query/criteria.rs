use crate::collection::Document;
use crate::common::{Value, CAST_SEPARATOR, EMPTY_SENTINEL, NOT_EMPTY_SENTINEL, OR_OPERATOR};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::query::CastType;
use std::fmt::{Debug, Formatter};

/// What a [Condition] expects of its field.
#[derive(Clone, Debug, PartialEq)]
pub enum Expectation {
    /// The field equals the value, after casting both sides when a cast is set.
    Equals(Value),
    /// The field is missing or empty-like (`*empty*`).
    Empty,
    /// The field holds a non-empty value (`*notempty*`).
    NotEmpty,
}

impl Expectation {
    fn from_value(value: Value) -> Expectation {
        match value.as_str() {
            Some(EMPTY_SENTINEL) => Expectation::Empty,
            Some(NOT_EMPTY_SENTINEL) => Expectation::NotEmpty,
            _ => Expectation::Equals(value),
        }
    }
}

/// A single `field[:type] = value` test.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    field: String,
    cast: Option<CastType>,
    expectation: Expectation,
}

impl Condition {
    /// Parses a criteria key such as `age:int` together with its value.
    pub fn parse(key: &str, value: Value) -> NestdocResult<Condition> {
        let (field, cast) = match key.split_once(CAST_SEPARATOR) {
            Some((field, cast)) => (field, Some(CastType::parse(cast)?)),
            None => (key, None),
        };

        if field.is_empty() {
            log::error!("Criteria key {} has no field name", key);
            return Err(NestdocError::new(
                &format!("Criteria key '{}' has no field name", key),
                ErrorKind::InvalidOperation,
            ));
        }

        Ok(Condition {
            field: field.to_string(),
            cast,
            expectation: Expectation::from_value(value),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn cast(&self) -> Option<CastType> {
        self.cast
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn matches(&self, document: &Document) -> bool {
        let actual = document.get(&self.field);
        match &self.expectation {
            Expectation::Empty => actual.is_empty_like(),
            Expectation::NotEmpty => !actual.is_empty_like(),
            Expectation::Equals(expected) => match self.cast {
                Some(cast) => cast.cast(&actual) == cast.cast(expected),
                None => is_strictly_equal(&actual, expected),
            },
        }
    }
}

/// Equality without any conversion: the variants must agree, except that
/// integers and floats compare numerically.
fn is_strictly_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::I64(_) | Value::F64(_), Value::I64(_) | Value::F64(_)) => actual == expected,
        _ => std::mem::discriminant(actual) == std::mem::discriminant(expected) && actual == expected,
    }
}

/// Filter specification evaluated against documents.
///
/// Every plain condition must hold. The `$or` conditions form a single extra
/// test that holds when any one of them matches.
///
/// # Examples
///
/// ```rust,ignore
/// let criteria = Criteria::new()
///     .with("status", "open")?
///     .with("age:int", "5")?
///     .with("notes", "*notempty*")?;
///
/// let from_query = Criteria::from_document(&doc! {
///     "$or": [{ owner: "ada" }, { owner: "bob" }]
/// })?;
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Criteria {
    conditions: Vec<Condition>,
    any_of: Vec<Condition>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria {
            conditions: Vec::new(),
            any_of: Vec::new(),
        }
    }

    /// Adds a condition for `key`; `key` may carry a `:type` cast suffix.
    pub fn with<T: Into<Value>>(mut self, key: &str, value: T) -> NestdocResult<Self> {
        self.conditions.push(Condition::parse(key, value.into())?);
        Ok(self)
    }

    /// Adds `$or` alternatives: every condition of `group` becomes one more
    /// alternative.
    pub fn or(mut self, group: Criteria) -> Self {
        self.any_of.extend(group.conditions);
        self.any_of.extend(group.any_of);
        self
    }

    /// Parses criteria from a document of `key: value` pairs.
    ///
    /// The `$or` key takes an array of documents (or a single document); each
    /// of their fields is an alternative.
    pub fn from_document(document: &Document) -> NestdocResult<Criteria> {
        let mut criteria = Criteria::new();
        for (key, value) in document.iter() {
            if key == OR_OPERATOR {
                criteria.any_of.extend(parse_or_groups(value)?);
            } else {
                criteria.conditions.push(Condition::parse(key, value.clone())?);
            }
        }
        Ok(criteria)
    }

    /// Criteria matching a single document id.
    pub fn by_id(id: &str) -> Criteria {
        Criteria {
            conditions: vec![Condition {
                field: crate::common::DOC_ID.to_string(),
                cast: None,
                expectation: Expectation::Equals(Value::from(id)),
            }],
            any_of: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.any_of.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn any_of(&self) -> &[Condition] {
        &self.any_of
    }

    pub fn matches(&self, document: &Document) -> bool {
        if !self.conditions.iter().all(|condition| condition.matches(document)) {
            return false;
        }
        self.any_of.is_empty() || self.any_of.iter().any(|condition| condition.matches(document))
    }
}

impl Debug for Criteria {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("conditions", &self.conditions)
            .field("any_of", &self.any_of)
            .finish()
    }
}

fn parse_or_groups(value: &Value) -> NestdocResult<Vec<Condition>> {
    let groups: Vec<&Document> = match value {
        Value::Document(group) => vec![group],
        Value::Array(items) => items.iter().filter_map(|item| item.as_document()).collect(),
        _ => {
            log::error!("Invalid {} value {:?}", OR_OPERATOR, value);
            return Err(NestdocError::new(
                &format!("{} expects a list of field groups", OR_OPERATOR),
                ErrorKind::InvalidOperation,
            ));
        }
    };

    let mut conditions = Vec::new();
    for group in groups {
        for (key, value) in group.iter() {
            conditions.push(Condition::parse(key, value.clone())?);
        }
    }
    Ok(conditions)
}
