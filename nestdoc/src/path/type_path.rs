use crate::common::{FIELD_SEPARATOR, MAX_NESTING_DEPTH};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

/// One level of a [TypePath].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeLevel {
    type_name: String,
    collection_field: Option<String>,
}

impl TypeLevel {
    /// The logical type name of documents at this level (`task`).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field of the parent document holding the children map (`tasks`).
    ///
    /// `None` for the root level.
    pub fn collection_field(&self) -> Option<&str> {
        self.collection_field.as_deref()
    }
}

/// The chain of types a service addresses, from the root document type down to
/// the type it manages.
///
/// # Examples
///
/// ```rust,ignore
/// let path = TypePath::new("project")?
///     .nested("tasks", "task")?
///     .nested("comments", "comment")?;
/// assert_eq!(path.name(), "project.task.comment");
/// assert_eq!(path.depth(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypePath {
    levels: SmallVec<[TypeLevel; 3]>,
}

impl TypePath {
    pub fn new(type_name: &str) -> NestdocResult<Self> {
        validate_segment(type_name, "Type name")?;
        let mut levels = SmallVec::new();
        levels.push(TypeLevel {
            type_name: type_name.to_string(),
            collection_field: None,
        });
        Ok(TypePath { levels })
    }

    /// Appends a nested level stored under `collection_field` of the current
    /// deepest type.
    pub fn nested(mut self, collection_field: &str, type_name: &str) -> NestdocResult<Self> {
        if self.levels.len() >= MAX_NESTING_DEPTH {
            log::error!("Type path {} cannot be nested deeper", self.name());
            return Err(NestdocError::new(
                &format!(
                    "Documents cannot be nested more than {} levels deep",
                    MAX_NESTING_DEPTH
                ),
                ErrorKind::InvalidOperation,
            ));
        }

        validate_segment(collection_field, "Collection field")?;
        validate_segment(type_name, "Type name")?;
        self.levels.push(TypeLevel {
            type_name: type_name.to_string(),
            collection_field: Some(collection_field.to_string()),
        });
        Ok(self)
    }

    /// Number of levels, 1 to 3.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[TypeLevel] {
        &self.levels
    }

    /// Type name of the managed (deepest) level.
    pub fn type_name(&self) -> &str {
        self.levels
            .last()
            .map(|level| level.type_name.as_str())
            .unwrap_or_default()
    }

    /// Collection field of the managed level; `None` for root documents.
    pub fn collection_field(&self) -> Option<&str> {
        self.levels.last().and_then(|level| level.collection_field())
    }

    /// Dotted type name used as the prefix of hook names.
    pub fn name(&self) -> String {
        self.levels
            .iter()
            .map(|level| level.type_name.as_str())
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR)
    }

    /// Fully qualified hook name for `stage`, e.g. `project.task.created`.
    pub fn hook_name(&self, stage: &str) -> String {
        format!("{}{}{}", self.name(), FIELD_SEPARATOR, stage)
    }

    pub(crate) fn collection_fields(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().filter_map(|level| level.collection_field())
    }
}

impl Display for TypePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn validate_segment(segment: &str, what: &str) -> NestdocResult<()> {
    if segment.is_empty() || segment.contains(FIELD_SEPARATOR) {
        log::error!("{} '{}' is not a valid path segment", what, segment);
        return Err(NestdocError::new(
            &format!("{} '{}' must be non-empty and cannot contain '{}'", what, segment, FIELD_SEPARATOR),
            ErrorKind::InvalidOperation,
        ));
    }
    Ok(())
}
