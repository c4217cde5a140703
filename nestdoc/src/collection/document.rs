use im::OrdMap;
use smallvec::SmallVec;

use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use std::borrow::Cow;
use std::fmt::{Debug, Display};

type FieldVec = SmallVec<[String; 8]>;

/// A schemaless document: an ordered mapping from field name to [Value].
///
/// Keys containing the field separator (`.`) address embedded documents, so
/// `doc.get("address.city")` reads `city` inside the `address` document and
/// `doc.put("address.city", "Paris")` creates `address` on the way if needed.
/// Numeric segments index into arrays on reads (`tags.0`).
///
/// The `id` field holds the document identity. It is assigned by the service
/// or the repository once the document is persisted and never changes after.
///
/// ## Persistent storage
///
/// Fields live in an `im::OrdMap`, so cloning a document is O(1) and every
/// clone is independent. Hook pipelines clone documents freely when handing
/// them to callbacks and events.
#[derive(Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of top-level fields.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`.
    ///
    /// Embedded keys (`"user.name"`) walk into nested documents, creating empty
    /// documents for missing or non-document intermediate levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or one of its segments is empty.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.put("name", "Alice")?;
    /// doc.put("address.city", "Paris")?;
    /// assert_eq!(doc.get("address.city"), Value::from("Paris"));
    /// ```
    pub fn put<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> NestdocResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(NestdocError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data.insert(key.to_string(), value);
            Ok(())
        }
    }

    /// Returns the value associated with `key`, or [Value::Null] when absent.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let doc = doc!{ location: { city: "New York" }, tags: ["a", "b"] };
    /// assert_eq!(doc.get("location.city"), Value::from("New York"));
    /// assert_eq!(doc.get("tags.1"), Value::from("b"));
    /// assert!(doc.get("missing").is_null());
    /// ```
    pub fn get(&self, key: &str) -> Value {
        match self.lookup(key) {
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }

    /// Returns true when `key` resolves to a stored value, even a null one.
    ///
    /// Embedded keys are followed through documents and array indices.
    pub fn contains_field(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns true when a top-level field named `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes the value at `key`; embedded keys remove inside nested documents.
    ///
    /// Removing a missing key is not an error. Parent documents are kept even
    /// when they become empty.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_remove(&splits)
        } else {
            self.data.remove(key)
        }
    }

    /// The document identifier, when one has been assigned.
    pub fn id(&self) -> Option<String> {
        match self.data.get(DOC_ID) {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::I64(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    pub fn set_id(&mut self, id: &str) {
        self.data.insert(DOC_ID.to_string(), Value::String(id.to_string()));
    }

    /// Returns a copy of this document without its `id` field.
    pub fn without_id(&self) -> Document {
        Document {
            data: self.data.without(DOC_ID),
        }
    }

    /// Top-level field names in key order.
    pub fn fields(&self) -> FieldVec {
        self.data.keys().cloned().collect()
    }

    /// Copies every top-level field of `other` into this document, replacing
    /// existing values.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn to_pretty_json(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let mut json_string = String::with_capacity(self.data.len() * 30 + indent * 2);
        json_string.push_str("{\n");
        let indent_str = " ".repeat(indent + 2);
        for (key, value) in self.data.iter() {
            json_string.push_str(&format!(
                "{}\"{}\": {},\n",
                indent_str,
                key,
                value.to_pretty_json(indent + 2)
            ));
        }

        json_string.pop();
        json_string.pop();
        json_string.push_str(&format!("\n{}}}", " ".repeat(indent)));
        json_string
    }

    pub(crate) fn to_debug_string(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let fields = self
            .data
            .iter()
            .map(|(key, value)| format!("\"{}\": {}", key, value.to_debug_string(indent + 2)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{}}}", fields)
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value);
        }
        if !key.contains(FIELD_SEPARATOR) {
            return None;
        }

        let mut splits = key.split(FIELD_SEPARATOR);
        let first = splits.next()?;
        let mut current = self.data.get(first)?;
        for segment in splits {
            current = match current {
                Value::Document(doc) => doc.data.get(segment)?,
                Value::Array(items) => {
                    let index = segment.parse::<usize>().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> NestdocResult<()> {
        let key = splits[0];
        if key.is_empty() {
            log::error!("Document does not support empty key segment");
            return Err(NestdocError::new(
                "Document does not support empty key segment",
                ErrorKind::InvalidOperation,
            ));
        }

        if splits.len() == 1 {
            self.data.insert(key.to_string(), value);
            return Ok(());
        }

        let mut nested = match self.data.get(key) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => Document::new(),
        };
        nested.deep_put(&splits[1..], value)?;
        self.data.insert(key.to_string(), Value::Document(nested));
        Ok(())
    }

    fn deep_remove(&mut self, splits: &[&str]) -> Option<Value> {
        let key = splits[0];
        if splits.len() == 1 {
            return self.data.remove(key);
        }

        match self.data.get(key) {
            Some(Value::Document(doc)) => {
                let mut nested = doc.clone();
                let removed = nested.deep_remove(&splits[1..]);
                if removed.is_some() {
                    self.data.insert(key.to_string(), Value::Document(nested));
                }
                removed
            }
            _ => None,
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string(0))
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pretty_json(0))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// # Examples
///
/// ```rust
/// use nestdoc::doc;
///
/// let empty = doc!{};
///
/// let project = doc!{
///     name: "Apollo",
///     budget: 1200,
///     owner: {
///         name: "Ada",
///         tags: ["admin", "lead"]
///     },
///     "stats.open": (3 + 4)
/// };
/// assert_eq!(project.get("stats.open").as_i64(), Some(&7));
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro converting values for [doc!].
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
