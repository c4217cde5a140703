use crate::collection::Document;
use crate::common::{Value, OPTION_CLEAN_DATA};
use crate::errors::NestdocResult;
use std::fmt::{Debug, Formatter};

/// Free-form options travelling with every service operation.
///
/// The engine reads a handful of well-known keys (`clean_data`) and forwards
/// the whole set untouched to the validator and to every callback, so
/// applications can thread their own flags through the pipeline.
///
/// # Examples
///
/// ```rust,ignore
/// let options = Options::new()
///     .with("clean_data", false)?
///     .with("actor", "importer")?;
/// assert_eq!(options.flag("clean_data"), Some(false));
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Options {
    values: Document,
}

impl Options {
    pub fn new() -> Self {
        Options {
            values: Document::new(),
        }
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with<T: Into<Value>>(mut self, key: &str, value: T) -> NestdocResult<Self> {
        self.values.put(key, value)?;
        Ok(self)
    }

    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) -> NestdocResult<()> {
        self.values.put(key, value)
    }

    /// Returns the value under `key`, or [Value::Null].
    pub fn get(&self, key: &str) -> Value {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Boolean view of an option; `None` when unset or not a boolean.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.values.get(key).as_bool().copied()
    }

    /// The `clean_data` flag, falling back to `default` when unset.
    pub fn clean_data(&self, default: bool) -> bool {
        self.flag(OPTION_CLEAN_DATA).unwrap_or(default)
    }

    pub fn as_document(&self) -> &Document {
        &self.values
    }
}

impl From<Document> for Options {
    fn from(values: Document) -> Self {
        Options { values }
    }
}

impl Debug for Options {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Options({:?})", self.values)
    }
}
